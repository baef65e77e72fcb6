//! Initial schema migration.
//!
//! - `users`: Telegram identities and their active budget pointer
//! - `budgets`: shared ledgers with a base and up to two auxiliary currencies
//! - `budget_memberships`: users ↔ budgets with role and soft-removal flag
//! - `budget_counters`: per-budget sequence numbers for recorded operations

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
pub(crate) enum Users {
    Table,
    Id,
    TelegramId,
    TelegramUsername,
    FirstName,
    LastName,
    ActiveBudgetId,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum Budgets {
    Table,
    Id,
    Name,
    BaseCurrency,
    #[iden = "aux_currency_1"]
    AuxCurrency1,
    #[iden = "aux_currency_2"]
    AuxCurrency2,
    Timezone,
    CreatedByUserId,
    CreatedAt,
    IsArchived,
}

#[derive(Iden)]
enum BudgetMemberships {
    Table,
    BudgetId,
    UserId,
    Role,
    JoinedAt,
    IsActive,
}

#[derive(Iden)]
enum BudgetCounters {
    Table,
    BudgetId,
    NextSeqNo,
    UpdatedAt,
}

/// Base and auxiliary currencies must be pairwise distinct.
const AUX_DISTINCT_CHECK: &str = "(aux_currency_1 IS NULL OR aux_currency_1 <> base_currency) \
     AND (aux_currency_2 IS NULL OR aux_currency_2 <> base_currency) \
     AND (aux_currency_1 IS NULL OR aux_currency_2 IS NULL OR aux_currency_1 <> aux_currency_2)";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ─────────────────────────────────────────────────────────────────────
        // users
        // ─────────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::TelegramId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::TelegramUsername).string())
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(ColumnDef::new(Users::ActiveBudgetId).string())
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────────
        // budgets
        // ─────────────────────────────────────────────────────────────────────
        // SQLite cannot add a foreign key to an existing table, so
        // users.active_budget_id stays a plain column; the engine clears it
        // whenever the referenced membership goes away.
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Budgets::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::BaseCurrency).string_len(3).not_null())
                    .col(ColumnDef::new(Budgets::AuxCurrency1).string_len(3))
                    .col(ColumnDef::new(Budgets::AuxCurrency2).string_len(3))
                    .col(ColumnDef::new(Budgets::Timezone).string().not_null())
                    .col(ColumnDef::new(Budgets::CreatedByUserId).string().not_null())
                    .col(ColumnDef::new(Budgets::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Budgets::IsArchived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .check(Expr::cust(AUX_DISTINCT_CHECK))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-created_by_user_id")
                            .from(Budgets::Table, Budgets::CreatedByUserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────────
        // budget_memberships
        // ─────────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BudgetMemberships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BudgetMemberships::BudgetId).string().not_null())
                    .col(ColumnDef::new(BudgetMemberships::UserId).string().not_null())
                    .col(ColumnDef::new(BudgetMemberships::Role).string().not_null())
                    .col(
                        ColumnDef::new(BudgetMemberships::JoinedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetMemberships::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .primary_key(
                        Index::create()
                            .col(BudgetMemberships::BudgetId)
                            .col(BudgetMemberships::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_memberships-budget_id")
                            .from(BudgetMemberships::Table, BudgetMemberships::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_memberships-user_id")
                            .from(BudgetMemberships::Table, BudgetMemberships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budget_memberships-user_id")
                    .table(BudgetMemberships::Table)
                    .col(BudgetMemberships::UserId)
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────────
        // budget_counters
        // ─────────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BudgetCounters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetCounters::BudgetId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BudgetCounters::NextSeqNo)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(BudgetCounters::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_counters-budget_id")
                            .from(BudgetCounters::Table, BudgetCounters::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BudgetCounters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
