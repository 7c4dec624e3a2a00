//! Recurring transaction rules, materialised into financial entries on demand.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RecurringRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecurringRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecurringRules::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(RecurringRules::Kind).text().not_null())
                    .col(ColumnDef::new(RecurringRules::Description).text().not_null())
                    .col(
                        ColumnDef::new(RecurringRules::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringRules::Frequency).text().not_null())
                    .col(ColumnDef::new(RecurringRules::StartDate).date().not_null())
                    .col(ColumnDef::new(RecurringRules::EndDate).date().null())
                    .col(ColumnDef::new(RecurringRules::ContactId).uuid().null())
                    .col(ColumnDef::new(RecurringRules::CategoryId).uuid().null())
                    .col(ColumnDef::new(RecurringRules::BankAccountId).uuid().null())
                    .col(
                        ColumnDef::new(RecurringRules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RecurringRules::LastGeneratedDate)
                            .date()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RecurringRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RecurringRules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecurringRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RecurringRules {
    Table,
    Id,
    CompanyId,
    Kind,
    Description,
    AmountCents,
    Frequency,
    StartDate,
    EndDate,
    ContactId,
    CategoryId,
    BankAccountId,
    IsActive,
    LastGeneratedDate,
    CreatedAt,
    UpdatedAt,
}
