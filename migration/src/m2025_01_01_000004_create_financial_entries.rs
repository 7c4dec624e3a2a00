//! Accounts payable and receivable.
//!
//! Both ledgers live in one table discriminated by `kind` (`payable` or
//! `receivable`); installments of the same purchase share `installment_group_id`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FinancialEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinancialEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FinancialEntries::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(FinancialEntries::Kind).text().not_null())
                    .col(ColumnDef::new(FinancialEntries::Description).text().not_null())
                    .col(
                        ColumnDef::new(FinancialEntries::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FinancialEntries::DueDate).date().not_null())
                    .col(ColumnDef::new(FinancialEntries::ContactId).uuid().null())
                    .col(ColumnDef::new(FinancialEntries::CategoryId).uuid().null())
                    .col(ColumnDef::new(FinancialEntries::BankAccountId).uuid().null())
                    .col(ColumnDef::new(FinancialEntries::Notes).text().null())
                    .col(
                        ColumnDef::new(FinancialEntries::InstallmentNumber)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::InstallmentTotal)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::InstallmentGroupId)
                            .uuid()
                            .null(),
                    )
                    .col(ColumnDef::new(FinancialEntries::RecurringRuleId).uuid().null())
                    .col(
                        ColumnDef::new(FinancialEntries::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(FinancialEntries::PaidDate).date().null())
                    .col(
                        ColumnDef::new(FinancialEntries::PaidAmountCents)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::InterestCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::DiscountCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::PaidBankAccountId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FinancialEntries::UpdatedAt)
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
                    .name("idx_financial_entries_company_kind_due")
                    .table(FinancialEntries::Table)
                    .col(FinancialEntries::CompanyId)
                    .col(FinancialEntries::Kind)
                    .col(FinancialEntries::DueDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_financial_entries_company_kind_due")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(FinancialEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FinancialEntries {
    Table,
    Id,
    CompanyId,
    Kind,
    Description,
    AmountCents,
    DueDate,
    ContactId,
    CategoryId,
    BankAccountId,
    Notes,
    InstallmentNumber,
    InstallmentTotal,
    InstallmentGroupId,
    RecurringRuleId,
    IsPaid,
    PaidDate,
    PaidAmountCents,
    InterestCents,
    DiscountCents,
    PaidBankAccountId,
    CreatedAt,
    UpdatedAt,
}
