//! # Product Model
//!
//! Simple products carry their own stock. Kit and dynamic products are
//! composed of other SKUs listed in `product_components`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    #[sea_orm(string_value = "simple")]
    #[default]
    Simple,
    #[sea_orm(string_value = "kit")]
    Kit,
    #[sea_orm(string_value = "dynamic")]
    Dynamic,
}

impl ProductKind {
    pub fn is_composite(self) -> bool {
        matches!(self, ProductKind::Kit | ProductKind::Dynamic)
    }
}

/// Infix inserted into the SKU of soft-deleted products.
pub const DELETED_SKU_MARKER: &str = "__deleted__";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Unique per company among non-deleted products
    pub sku: String,

    pub name: String,

    pub kind: ProductKind,

    /// Unit cost; `None` when unknown
    pub cost_price_cents: Option<i64>,

    pub sale_price_cents: i64,

    pub stock: i32,

    /// Object-store key of the product image
    pub image_path: Option<String>,

    pub deleted_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_component::Entity")]
    Components,
}

impl Related<super::product_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Components.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
