//! # OAuth State Model
//!
//! CSRF state and PKCE verifier for an in-flight authorization.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    /// Primary key UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Company the resulting integration will belong to
    pub company_id: Uuid,

    /// Provider name (e.g., "mercadolivre")
    pub provider: String,

    /// State token generated for CSRF protection
    pub state: String,

    /// PKCE code verifier
    pub code_verifier: Option<String>,

    /// Expiration timestamp
    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
