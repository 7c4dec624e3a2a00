//! Mercado Livre integrations, their listing snapshots and SKU mappings.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MlIntegrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MlIntegrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MlIntegrations::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(MlIntegrations::ExternalStoreId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MlIntegrations::Nickname).text().null())
                    .col(
                        ColumnDef::new(MlIntegrations::Status)
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(MlIntegrations::AccessTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MlIntegrations::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MlIntegrations::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MlIntegrations::ConnectedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlIntegrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MlIntegrations::UpdatedAt)
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
                    .name("idx_ml_integrations_company_store")
                    .table(MlIntegrations::Table)
                    .col(MlIntegrations::CompanyId)
                    .col(MlIntegrations::ExternalStoreId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MlListings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MlListings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(MlListings::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(MlListings::IntegrationId).uuid().not_null())
                    .col(
                        ColumnDef::new(MlListings::ExternalListingId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MlListings::Title).text().not_null())
                    .col(
                        ColumnDef::new(MlListings::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MlListings::AvailableQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MlListings::Status).text().not_null())
                    .col(ColumnDef::new(MlListings::Permalink).text().null())
                    .col(ColumnDef::new(MlListings::Thumbnail).text().null())
                    .col(ColumnDef::new(MlListings::CategoryId).text().null())
                    .col(ColumnDef::new(MlListings::SellerSku).text().null())
                    .col(
                        ColumnDef::new(MlListings::VariationCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MlListings::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlListings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ml_listings_integration_id")
                            .from(MlListings::Table, MlListings::IntegrationId)
                            .to(MlIntegrations::Table, MlIntegrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key targeted by the listing upsert's ON CONFLICT clause.
        manager
            .create_index(
                Index::create()
                    .name("idx_ml_listings_natural_key")
                    .table(MlListings::Table)
                    .col(MlListings::CompanyId)
                    .col(MlListings::IntegrationId)
                    .col(MlListings::ExternalListingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MlProductMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MlProductMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MlProductMappings::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(MlProductMappings::IntegrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlProductMappings::ExternalListingId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlProductMappings::VariationId)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(MlProductMappings::ProductSku).text().not_null())
                    .col(
                        ColumnDef::new(MlProductMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MlProductMappings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ml_product_mappings_integration_id")
                            .from(MlProductMappings::Table, MlProductMappings::IntegrationId)
                            .to(MlIntegrations::Table, MlIntegrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A (listing, variation) pair maps to at most one SKU.
        manager
            .create_index(
                Index::create()
                    .name("idx_ml_product_mappings_listing_variation")
                    .table(MlProductMappings::Table)
                    .col(MlProductMappings::CompanyId)
                    .col(MlProductMappings::ExternalListingId)
                    .col(MlProductMappings::VariationId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MlProductMappings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MlListings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MlIntegrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MlIntegrations {
    Table,
    Id,
    CompanyId,
    ExternalStoreId,
    Nickname,
    Status,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    TokenExpiresAt,
    ConnectedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MlListings {
    Table,
    Id,
    CompanyId,
    IntegrationId,
    ExternalListingId,
    Title,
    PriceCents,
    AvailableQuantity,
    Status,
    Permalink,
    Thumbnail,
    CategoryId,
    SellerSku,
    VariationCount,
    LastSyncedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MlProductMappings {
    Table,
    Id,
    CompanyId,
    IntegrationId,
    ExternalListingId,
    VariationId,
    ProductSku,
    CreatedAt,
    UpdatedAt,
}
