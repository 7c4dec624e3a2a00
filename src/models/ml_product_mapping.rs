//! Listing (or listing variation) to internal SKU mapping.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored `variation_id` for a mapping that covers the whole listing.
pub const WHOLE_LISTING: &str = "";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ml_product_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub integration_id: Uuid,
    pub external_listing_id: String,
    /// Empty for the whole listing
    pub variation_id: String,
    pub product_sku: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
