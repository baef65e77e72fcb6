use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Budget, BudgetSummary, ResultEngine, budgets, memberships, users,
    util::{parse_optional_uuid, parse_uuid},
};

use super::{Engine, with_tx};

impl Engine {
    /// The user's active-budget pointer, if set.
    pub async fn active_budget_id(&self, user_id: Uuid) -> ResultEngine<Option<Uuid>> {
        with_tx!(self, |db_tx| {
            let user = self.require_user(&db_tx, user_id).await?;
            parse_optional_uuid(user.active_budget_id.as_deref(), "budget")
        })
    }

    /// Point the user at a budget they are an active member of.
    pub async fn set_active_budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        with_tx!(self, |db_tx| {
            let user = self.require_user(&db_tx, user_id).await?;
            self.require_member(&db_tx, budget_id, user_id).await?;
            let budget = self.require_available_budget(&db_tx, budget_id).await?;

            let mut active: users::ActiveModel = user.into();
            active.active_budget_id = ActiveValue::Set(Some(budget_id.to_string()));
            active.update(&db_tx).await?;

            Budget::try_from(budget)
        })
    }

    /// Budgets the user actively belongs to, oldest first. Archived budgets
    /// are left out.
    pub async fn list_user_budgets(&self, user_id: Uuid) -> ResultEngine<Vec<BudgetSummary>> {
        with_tx!(self, |db_tx| {
            let user = self.require_user(&db_tx, user_id).await?;
            let rows: Vec<(budgets::Model, Option<memberships::Model>)> = budgets::Entity::find()
                .find_also_related(memberships::Entity)
                .filter(memberships::Column::UserId.eq(user_id.to_string()))
                .filter(memberships::Column::IsActive.eq(true))
                .filter(budgets::Column::IsArchived.eq(false))
                .order_by_asc(budgets::Column::CreatedAt)
                .all(&db_tx)
                .await?;

            rows.into_iter()
                .filter_map(|(budget, membership)| membership.map(|m| (budget, m)))
                .map(|(budget, membership)| {
                    Ok(BudgetSummary {
                        id: parse_uuid(&budget.id, "budget")?,
                        is_default: user.active_budget_id.as_deref() == Some(budget.id.as_str()),
                        name: budget.name,
                        role: membership.role()?,
                    })
                })
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// The budget the home screen is about: the active one if still listed,
    /// otherwise the oldest. `None` means the user has no budget yet.
    pub async fn home_budget(&self, user_id: Uuid) -> ResultEngine<Option<BudgetSummary>> {
        let mut budgets = self.list_user_budgets(user_id).await?;
        if budgets.is_empty() {
            return Ok(None);
        }
        let position = budgets.iter().position(|b| b.is_default).unwrap_or(0);
        Ok(Some(budgets.swap_remove(position)))
    }
}
