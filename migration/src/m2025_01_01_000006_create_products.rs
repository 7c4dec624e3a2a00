//! Product catalog with kit/dynamic component lists.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Products::Sku).text().not_null())
                    .col(ColumnDef::new(Products::Name).text().not_null())
                    .col(
                        ColumnDef::new(Products::Kind)
                            .text()
                            .not_null()
                            .default("simple"),
                    )
                    .col(ColumnDef::new(Products::CostPriceCents).big_integer().null())
                    .col(
                        ColumnDef::new(Products::SalePriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::Stock)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Products::ImagePath).text().null())
                    .col(
                        ColumnDef::new(Products::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Soft-deleted rows get a renamed SKU, so the plain pair stays unique.
        manager
            .create_index(
                Index::create()
                    .name("idx_products_company_sku")
                    .table(Products::Table)
                    .col(Products::CompanyId)
                    .col(Products::Sku)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductComponents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductComponents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProductComponents::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ProductComponents::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ProductComponents::ComponentSku).text().not_null())
                    .col(
                        ColumnDef::new(ProductComponents::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_components_product_id")
                            .from(ProductComponents::Table, ProductComponents::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_components_company_sku")
                    .table(ProductComponents::Table)
                    .col(ProductComponents::CompanyId)
                    .col(ProductComponents::ComponentSku)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductComponents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    CompanyId,
    Sku,
    Name,
    Kind,
    CostPriceCents,
    SalePriceCents,
    Stock,
    ImagePath,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProductComponents {
    Table,
    Id,
    CompanyId,
    ProductId,
    ComponentSku,
    Quantity,
}
