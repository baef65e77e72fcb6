use sea_orm::{
    DatabaseTransaction, JoinType, QueryFilter, QueryOrder, QuerySelect, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{EngineError, MembershipRole, ResultEngine, budgets, memberships, users};

use super::Engine;

impl Engine {
    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or(EngineError::UserNotFound)
    }

    /// Budget that exists and is not archived.
    pub(super) async fn require_available_budget(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
    ) -> ResultEngine<budgets::Model> {
        match budgets::Entity::find_by_id(budget_id.to_string())
            .one(db)
            .await?
        {
            Some(model) if !model.is_archived => Ok(model),
            _ => Err(EngineError::BudgetUnavailable),
        }
    }

    pub(super) async fn active_membership(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<Option<memberships::Model>> {
        memberships::Entity::find_by_id((budget_id.to_string(), user_id.to_string()))
            .filter(memberships::Column::IsActive.eq(true))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Role of an active member, `NotMember` otherwise.
    pub(super) async fn require_member(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<MembershipRole> {
        self.active_membership(db, budget_id, user_id)
            .await?
            .ok_or(EngineError::NotMember)?
            .role()
    }

    /// Active owner of a non-archived budget.
    ///
    /// Ownership is checked first so that non-owners never learn whether a
    /// budget is archived.
    pub(super) async fn require_owner(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<budgets::Model> {
        let role = self
            .active_membership(db, budget_id, user_id)
            .await?
            .map(|m| m.role())
            .transpose()?;
        if role != Some(MembershipRole::Owner) {
            return Err(EngineError::NotOwner);
        }
        self.require_available_budget(db, budget_id).await
    }

    /// The budget the caller owns when no budget is named explicitly.
    ///
    /// The active-budget pointer wins when it references an owned budget;
    /// otherwise the oldest owned, non-archived budget is used.
    pub(super) async fn resolve_owned_budget(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<budgets::Model> {
        let user = self.require_user(db, user_id).await?;
        let owned: Vec<budgets::Model> = budgets::Entity::find()
            .join(JoinType::InnerJoin, budgets::Relation::Memberships.def())
            .filter(memberships::Column::UserId.eq(user_id.to_string()))
            .filter(memberships::Column::Role.eq(MembershipRole::Owner.as_str()))
            .filter(memberships::Column::IsActive.eq(true))
            .order_by_asc(budgets::Column::CreatedAt)
            .all(db)
            .await?;
        if owned.is_empty() {
            return Err(EngineError::NotOwner);
        }

        let preferred = user
            .active_budget_id
            .as_deref()
            .and_then(|active| owned.iter().find(|b| b.id == active && !b.is_archived));
        if let Some(model) = preferred {
            return Ok(model.clone());
        }
        owned
            .into_iter()
            .find(|b| !b.is_archived)
            .ok_or(EngineError::BudgetUnavailable)
    }

    /// Clear `active_budget_id` for users pointing at `budget_id`, optionally
    /// restricted to one user.
    pub(super) async fn clear_active_budget(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: Option<Uuid>,
    ) -> ResultEngine<u64> {
        let mut update = users::Entity::update_many()
            .col_expr(
                users::Column::ActiveBudgetId,
                Expr::value(Option::<String>::None),
            )
            .filter(users::Column::ActiveBudgetId.eq(budget_id.to_string()));
        if let Some(user_id) = user_id {
            update = update.filter(users::Column::Id.eq(user_id.to_string()));
        }
        Ok(update.exec(db).await?.rows_affected)
    }

    /// Point the user at `budget_id` unless they already have an active budget.
    pub(super) async fn set_active_budget_if_empty(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        budget_id: Uuid,
    ) -> ResultEngine<()> {
        users::Entity::update_many()
            .col_expr(
                users::Column::ActiveBudgetId,
                Expr::value(Some(budget_id.to_string())),
            )
            .filter(users::Column::Id.eq(user_id.to_string()))
            .filter(users::Column::ActiveBudgetId.is_null())
            .exec(db)
            .await?;
        Ok(())
    }
}
