//! Single-use connection tokens and OAuth state records.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConnectionTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectionTokens::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConnectionTokens::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ConnectionTokens::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ConnectionTokens::TokenHash)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ConnectionTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectionTokens::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ConnectionTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuthStates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OAuthStates::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OAuthStates::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(OAuthStates::Provider).text().not_null())
                    .col(ColumnDef::new(OAuthStates::State).text().not_null())
                    .col(ColumnDef::new(OAuthStates::CodeVerifier).text().null())
                    .col(
                        ColumnDef::new(OAuthStates::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuthStates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_states_provider_state")
                    .table(OAuthStates::Table)
                    .col(OAuthStates::Provider)
                    .col(OAuthStates::State)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuthStates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConnectionTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConnectionTokens {
    Table,
    Id,
    CompanyId,
    UserId,
    TokenHash,
    ExpiresAt,
    UsedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OAuthStates {
    #[sea_orm(iden = "oauth_states")]
    Table,
    Id,
    CompanyId,
    Provider,
    State,
    CodeVerifier,
    ExpiresAt,
    CreatedAt,
}
