//! Local snapshot of a marketplace listing.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ml_listings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub integration_id: Uuid,
    /// Marketplace item id (e.g. `MLB123`)
    pub external_listing_id: String,
    pub title: String,
    pub price_cents: i64,
    pub available_quantity: i32,
    pub status: String,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    pub category_id: Option<String>,
    /// Name resolved through `/categories/{id}` during sync
    pub category_name: Option<String>,
    /// `seller_custom_field` of the item
    pub seller_sku: Option<String>,
    pub variation_count: i32,
    pub last_synced_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ml_integration::Entity",
        from = "Column::IntegrationId",
        to = "super::ml_integration::Column::Id",
        on_delete = "Cascade"
    )]
    Integration,
}

impl Related<super::ml_integration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
