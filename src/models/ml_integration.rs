//! # Mercado Livre Integration Model
//!
//! One row per connected seller account. Tokens are sealed with
//! [`crate::crypto::seal_token`] using the row id as associated data.

use chrono::{Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Validity window of a connection, counted from the last (re)connect.
pub const INTEGRATION_VALIDITY_DAYS: i64 = 365;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    #[sea_orm(string_value = "active")]
    Active,
    /// Tokens can no longer be renewed; the seller must reconnect
    #[sea_orm(string_value = "error")]
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ml_integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Marketplace user id of the seller
    pub external_store_id: String,

    pub nickname: Option<String>,

    pub status: IntegrationStatus,

    pub access_token_ciphertext: Option<Vec<u8>>,

    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// Access token expiry reported by the token endpoint
    pub token_expires_at: Option<DateTimeUtc>,

    /// Last successful OAuth callback
    pub connected_at: DateTimeUtc,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ml_listing::Entity")]
    Listings,
}

impl Related<super::ml_listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn expires_at(&self) -> DateTimeUtc {
        self.connected_at + Duration::days(INTEGRATION_VALIDITY_DAYS)
    }

    /// Derived at read time; nothing ever writes an "expired" status.
    pub fn is_expired_at(&self, now: DateTimeUtc) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the stored access token is past its reported expiry.
    pub fn access_token_stale_at(&self, now: DateTimeUtc) -> bool {
        self.token_expires_at.is_some_and(|expires| now >= expires)
    }
}
