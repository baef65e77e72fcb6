use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, JoinType, QueryFilter, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Budget, BudgetDraft, EngineError, MembershipRole, ResultEngine, budget_counters, budgets,
    invites, memberships,
};

use super::{Engine, with_tx};

impl Engine {
    /// Create the first budget of a user, who becomes its owner.
    ///
    /// Inserts the budget, the owner membership and the budget counter in one
    /// transaction, then points the owner's active budget at it if unset.
    pub async fn create_first_budget(
        &self,
        owner_id: Uuid,
        draft: &BudgetDraft,
        now: DateTime<Utc>,
    ) -> ResultEngine<Budget> {
        let validated = draft.validate()?;
        let budget = Budget {
            id: Uuid::new_v4(),
            name: validated.name,
            base_currency: validated.base_currency,
            aux_currency_1: validated.aux_currency_1,
            aux_currency_2: validated.aux_currency_2,
            timezone: validated.timezone,
            created_by: owner_id,
            created_at: now,
            is_archived: false,
        };

        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, owner_id).await?;

            let has_budget = memberships::Entity::find()
                .join(JoinType::InnerJoin, memberships::Relation::Budgets.def())
                .filter(memberships::Column::UserId.eq(owner_id.to_string()))
                .filter(memberships::Column::IsActive.eq(true))
                .filter(budgets::Column::IsArchived.eq(false))
                .one(&db_tx)
                .await?
                .is_some();
            if has_budget {
                return Err(EngineError::AlreadyHasBudget);
            }

            let budget_model: budgets::ActiveModel = (&budget).into();
            budget_model.insert(&db_tx).await?;

            memberships::ActiveModel {
                budget_id: ActiveValue::Set(budget.id.to_string()),
                user_id: ActiveValue::Set(owner_id.to_string()),
                role: ActiveValue::Set(MembershipRole::Owner.as_str().to_string()),
                joined_at: ActiveValue::Set(now),
                is_active: ActiveValue::Set(true),
            }
            .insert(&db_tx)
            .await?;

            budget_counters::ActiveModel {
                budget_id: ActiveValue::Set(budget.id.to_string()),
                next_seq_no: ActiveValue::Set(1),
                updated_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            self.set_active_budget_if_empty(&db_tx, owner_id, budget.id)
                .await?;

            tracing::info!(budget_id = %budget.id, %owner_id, "budget created");
            Ok(budget)
        })
    }

    /// Return a budget the user is an active member of.
    pub async fn budget_detail(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, budget_id, user_id).await?;
            let model = self.require_available_budget(&db_tx, budget_id).await?;
            Budget::try_from(model)
        })
    }

    /// Archive a budget (owner-only).
    ///
    /// Memberships are kept; open invites are deactivated and every member's
    /// active-budget pointer to it is cleared.
    pub async fn archive_budget(&self, owner_id: Uuid, budget_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_owner(&db_tx, budget_id, owner_id).await?;

            let mut active: budgets::ActiveModel = model.into();
            active.is_archived = ActiveValue::Set(true);
            active.update(&db_tx).await?;

            invites::Entity::update_many()
                .col_expr(invites::Column::IsActive, Expr::value(false))
                .filter(invites::Column::BudgetId.eq(budget_id.to_string()))
                .filter(invites::Column::IsActive.eq(true))
                .exec(&db_tx)
                .await?;

            let cleared = self.clear_active_budget(&db_tx, budget_id, None).await?;
            tracing::info!(%budget_id, cleared, "budget archived");
            Ok(())
        })
    }
}
