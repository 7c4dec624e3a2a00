//! Bank accounts and their append-only transaction history.
//!
//! Balances are stored in minor units (cents).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BankAccounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BankAccounts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(BankAccounts::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(BankAccounts::Name).text().not_null())
                    .col(ColumnDef::new(BankAccounts::BankCode).text().null())
                    .col(ColumnDef::new(BankAccounts::Agency).text().null())
                    .col(ColumnDef::new(BankAccounts::AccountNumber).text().null())
                    .col(
                        ColumnDef::new(BankAccounts::InitialBalanceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::CurrentBalanceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::OverdraftLimitCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bank_accounts_company_id")
                    .table(BankAccounts::Table)
                    .col(BankAccounts::CompanyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BankTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankTransactions::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(BankTransactions::BankAccountId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankTransactions::Kind).text().not_null())
                    .col(
                        ColumnDef::new(BankTransactions::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BankTransactions::BalanceAfterCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankTransactions::ReferenceId).uuid().null())
                    .col(ColumnDef::new(BankTransactions::Description).text().null())
                    .col(
                        ColumnDef::new(BankTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bank_transactions_bank_account_id")
                            .from(BankTransactions::Table, BankTransactions::BankAccountId)
                            .to(BankAccounts::Table, BankAccounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bank_transactions_account_created")
                    .table(BankTransactions::Table)
                    .col(BankTransactions::BankAccountId)
                    .col(BankTransactions::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BankTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BankAccounts {
    Table,
    Id,
    CompanyId,
    Name,
    BankCode,
    Agency,
    AccountNumber,
    InitialBalanceCents,
    CurrentBalanceCents,
    OverdraftLimitCents,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BankTransactions {
    Table,
    Id,
    CompanyId,
    BankAccountId,
    Kind,
    AmountCents,
    BalanceAfterCents,
    ReferenceId,
    Description,
    CreatedAt,
}
