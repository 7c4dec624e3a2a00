//! # Connection Token Repository
//!
//! Short-lived links that let the marketplace OAuth flow start from a plain
//! browser navigation. Only the SHA-256 of a token is stored, and consumption
//! is a single conditional `UPDATE`, so two concurrent uses cannot both win.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::RepositoryResult;
use crate::models::connection_token::{self, Entity as ConnectionToken};

pub const CONNECTION_TOKEN_TTL_MINUTES: i64 = 60;

/// Raw token handed to the client once; never persisted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}

pub struct ConnectionTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl ConnectionTokenRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn issue(&self, company_id: Uuid, user_id: Uuid) -> RepositoryResult<IssuedToken> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(CONNECTION_TOKEN_TTL_MINUTES);

        connection_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            user_id: Set(user_id),
            token_hash: Set(hash_token(&token)),
            expires_at: Set(expires_at),
            used_at: Set(None),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Marks the token used. Returns `None` unless exactly one unused,
    /// unexpired row matched.
    pub async fn consume(&self, token: &str) -> RepositoryResult<Option<connection_token::Model>> {
        let hash = hash_token(token);
        let now = Utc::now();

        let result = ConnectionToken::update_many()
            .col_expr(connection_token::Column::UsedAt, Expr::value(now))
            .filter(connection_token::Column::TokenHash.eq(hash.as_str()))
            .filter(connection_token::Column::UsedAt.is_null())
            .filter(connection_token::Column::ExpiresAt.gt(now))
            .exec(&*self.db)
            .await?;

        if result.rows_affected != 1 {
            tracing::debug!(rows = result.rows_affected, "Connection token rejected");
            return Ok(None);
        }

        Ok(ConnectionToken::find()
            .filter(connection_token::Column::TokenHash.eq(hash))
            .one(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
