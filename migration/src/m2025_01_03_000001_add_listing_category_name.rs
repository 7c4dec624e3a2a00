//! Stores the resolved marketplace category name next to its id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(MlListings::Table)
                    .add_column(ColumnDef::new(MlListings::CategoryName).text().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(MlListings::Table)
                    .drop_column(MlListings::CategoryName)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum MlListings {
    Table,
    CategoryName,
}
