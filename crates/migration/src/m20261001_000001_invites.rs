use sea_orm_migration::prelude::*;

use crate::m20261001_000000_init::{Budgets, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum BudgetInvites {
    Table,
    Id,
    Token,
    BudgetId,
    CreatedByUserId,
    CreatedAt,
    ExpiresAt,
    MaxUses,
    UsedCount,
    LastUsedAt,
    IsActive,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BudgetInvites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetInvites::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BudgetInvites::Token).string().not_null())
                    .col(ColumnDef::new(BudgetInvites::BudgetId).string().not_null())
                    .col(
                        ColumnDef::new(BudgetInvites::CreatedByUserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetInvites::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetInvites::ExpiresAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetInvites::MaxUses)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(BudgetInvites::UsedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(BudgetInvites::LastUsedAt).timestamp())
                    .col(
                        ColumnDef::new(BudgetInvites::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .check(Expr::cust("used_count >= 0 AND used_count <= max_uses"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_invites-budget_id")
                            .from(BudgetInvites::Table, BudgetInvites::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_invites-created_by_user_id")
                            .from(BudgetInvites::Table, BudgetInvites::CreatedByUserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budget_invites-token-unique")
                    .table(BudgetInvites::Table)
                    .col(BudgetInvites::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budget_invites-budget_id")
                    .table(BudgetInvites::Table)
                    .col(BudgetInvites::BudgetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BudgetInvites::Table).to_owned())
            .await?;
        Ok(())
    }
}
