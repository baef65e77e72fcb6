use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, Invite, InvitePreview, Membership, MembershipRole, ResultEngine, User, budgets,
    invites, memberships,
};

use super::{Engine, with_tx};

impl Engine {
    /// Create an invite for the budget the caller owns.
    pub async fn create_invite(&self, owner_id: Uuid, now: DateTime<Utc>) -> ResultEngine<Invite> {
        with_tx!(self, |db_tx| {
            let budget = self.resolve_owned_budget(&db_tx, owner_id).await?;
            let budget_id = crate::util::parse_uuid(&budget.id, "budget")?;
            self.insert_invite(&db_tx, budget_id, owner_id, now).await
        })
    }

    /// Create an invite for a specific budget the caller owns.
    pub async fn create_invite_for_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Invite> {
        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, budget_id, owner_id).await?;
            self.insert_invite(&db_tx, budget_id, owner_id, now).await
        })
    }

    /// Describe an invite without consuming it.
    pub async fn preview_invite(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<InvitePreview> {
        with_tx!(self, |db_tx| {
            let (invite, budget) = self.usable_invite(&db_tx, token, now).await?;
            let inviter = User::try_from(self.require_user(&db_tx, invite.created_by).await?)?;
            Ok(InvitePreview {
                token: invite.token,
                budget_id: invite.budget_id,
                budget_name: budget.name,
                inviter,
                expires_at: invite.expires_at,
            })
        })
    }

    /// Consume an invite and make the user a participant of its budget.
    ///
    /// The invite is consumed with a single conditional update, so when
    /// several users race on a single-use token exactly one of them joins.
    /// A previously removed member gets their old membership row back.
    pub async fn accept_invite(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Membership> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let (invite, _budget) = self.usable_invite(&db_tx, token, now).await?;

            if self
                .active_membership(&db_tx, invite.budget_id, user_id)
                .await?
                .is_some()
            {
                return Err(EngineError::AlreadyMember);
            }

            let consumed = invites::Entity::update_many()
                .col_expr(
                    invites::Column::UsedCount,
                    Expr::col(invites::Column::UsedCount).add(1),
                )
                .col_expr(invites::Column::LastUsedAt, Expr::value(Some(now)))
                // SET expressions see the pre-update row.
                .col_expr(
                    invites::Column::IsActive,
                    Expr::cust("used_count + 1 < max_uses"),
                )
                .filter(invites::Column::Id.eq(invite.id.to_string()))
                .filter(invites::Column::IsActive.eq(true))
                .filter(
                    Expr::col(invites::Column::UsedCount).lt(Expr::col(invites::Column::MaxUses)),
                )
                .exec(&db_tx)
                .await?
                .rows_affected;
            if consumed != 1 {
                return Err(EngineError::InviteExhausted);
            }

            let membership = self
                .upsert_participant(&db_tx, invite.budget_id, user_id, now)
                .await?;
            self.set_active_budget_if_empty(&db_tx, user_id, invite.budget_id)
                .await?;

            tracing::info!(budget_id = %invite.budget_id, %user_id, "invite accepted");
            Membership::try_from(membership)
        })
    }

    async fn insert_invite(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Invite> {
        let invite = Invite::new(budget_id, owner_id, now);
        let model: invites::ActiveModel = (&invite).into();
        model.insert(db).await?;
        tracing::debug!(%budget_id, invite_id = %invite.id, "invite created");
        Ok(invite)
    }

    /// Invite that can still be accepted at `now`, with its budget.
    async fn usable_invite(
        &self,
        db: &DatabaseTransaction,
        token: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<(Invite, budgets::Model)> {
        let token = token.trim();
        if token.is_empty() {
            return Err(EngineError::InviteNotFound);
        }
        let model = invites::Entity::find()
            .filter(invites::Column::Token.eq(token))
            .one(db)
            .await?
            .ok_or(EngineError::InviteNotFound)?;
        let invite = Invite::try_from(model)?;
        invite.ensure_usable(now)?;
        let budget = self.require_available_budget(db, invite.budget_id).await?;
        Ok((invite, budget))
    }

    /// Insert a participant membership, or reactivate an inactive one.
    async fn upsert_participant(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<memberships::Model> {
        let existing = memberships::Entity::find_by_id((budget_id.to_string(), user_id.to_string()))
            .one(db)
            .await?;
        let model = match existing {
            Some(model) => {
                let mut active: memberships::ActiveModel = model.into();
                active.role = ActiveValue::Set(MembershipRole::Participant.as_str().to_string());
                active.joined_at = ActiveValue::Set(now);
                active.is_active = ActiveValue::Set(true);
                active.update(db).await?
            }
            None => {
                memberships::ActiveModel {
                    budget_id: ActiveValue::Set(budget_id.to_string()),
                    user_id: ActiveValue::Set(user_id.to_string()),
                    role: ActiveValue::Set(MembershipRole::Participant.as_str().to_string()),
                    joined_at: ActiveValue::Set(now),
                    is_active: ActiveValue::Set(true),
                }
                .insert(db)
                .await?
            }
        };
        Ok(model)
    }
}
