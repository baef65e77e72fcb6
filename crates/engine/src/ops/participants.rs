use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{EngineError, MembershipRole, ResultEngine, User, memberships, users, util::parse_uuid};

use super::{Engine, with_tx};

/// An active member of a budget, as shown to its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub user: User,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl Engine {
    /// List the active members of the budget the caller owns.
    ///
    /// The owner comes first, then participants by join time.
    pub async fn list_participants(&self, owner_id: Uuid) -> ResultEngine<Vec<Participant>> {
        with_tx!(self, |db_tx| {
            let budget = self.resolve_owned_budget(&db_tx, owner_id).await?;
            let budget_id = parse_uuid(&budget.id, "budget")?;
            self.active_participants(&db_tx, budget_id).await
        })
    }

    /// List the active members of a specific budget the caller owns.
    pub async fn list_participants_for_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
    ) -> ResultEngine<Vec<Participant>> {
        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, budget_id, owner_id).await?;
            self.active_participants(&db_tx, budget_id).await
        })
    }

    /// One active member of a budget the caller owns.
    pub async fn participant(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        participant_id: Uuid,
    ) -> ResultEngine<Participant> {
        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, budget_id, owner_id).await?;
            let membership = self
                .active_membership(&db_tx, budget_id, participant_id)
                .await?
                .ok_or(EngineError::ParticipantNotFound)?;
            let user = User::try_from(self.require_user(&db_tx, participant_id).await?)?;
            Ok(Participant {
                user,
                role: membership.role()?,
                joined_at: membership.joined_at,
            })
        })
    }

    /// Remove a participant from the budget the caller owns.
    pub async fn remove_participant(
        &self,
        owner_id: Uuid,
        participant_id: Uuid,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let budget = self.resolve_owned_budget(&db_tx, owner_id).await?;
            let budget_id = parse_uuid(&budget.id, "budget")?;
            self.deactivate_participant(&db_tx, budget_id, participant_id)
                .await
        })
    }

    /// Remove a participant from a specific budget the caller owns.
    pub async fn remove_participant_from_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        participant_id: Uuid,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, budget_id, owner_id).await?;
            self.deactivate_participant(&db_tx, budget_id, participant_id)
                .await
        })
    }

    async fn active_participants(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
    ) -> ResultEngine<Vec<Participant>> {
        let rows: Vec<(memberships::Model, Option<users::Model>)> = memberships::Entity::find()
            .find_also_related(users::Entity)
            .filter(memberships::Column::BudgetId.eq(budget_id.to_string()))
            .filter(memberships::Column::IsActive.eq(true))
            .order_by_asc(memberships::Column::JoinedAt)
            .all(db)
            .await?;

        let mut participants = rows
            .into_iter()
            .map(|(membership, user)| {
                let user = user.ok_or(EngineError::UserNotFound)?;
                Ok(Participant {
                    user: User::try_from(user)?,
                    role: membership.role()?,
                    joined_at: membership.joined_at,
                })
            })
            .collect::<ResultEngine<Vec<_>>>()?;
        // Stable: keeps join order within each role.
        participants.sort_by_key(|p| p.role != MembershipRole::Owner);
        Ok(participants)
    }

    /// Deactivate a membership and clear the removed user's pointer to the
    /// budget.
    async fn deactivate_participant(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        participant_id: Uuid,
    ) -> ResultEngine<()> {
        let membership = self
            .active_membership(db, budget_id, participant_id)
            .await?
            .ok_or(EngineError::ParticipantNotFound)?;
        if membership.role()? == MembershipRole::Owner {
            return Err(EngineError::CannotRemoveOwner);
        }

        let mut active: memberships::ActiveModel = membership.into();
        active.is_active = ActiveValue::Set(false);
        active.update(db).await?;

        self.clear_active_budget(db, budget_id, Some(participant_id))
            .await?;
        tracing::info!(%budget_id, %participant_id, "participant removed");
        Ok(())
    }
}
