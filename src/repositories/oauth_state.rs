//! # OAuth State Repository
//!
//! CSRF state plus PKCE verifier for an authorization in flight. A state is
//! deleted when consumed.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

use super::RepositoryResult;
use crate::models::oauth_state::{self, Entity as OAuthState, Model};

pub const OAUTH_STATE_TTL_MINUTES: i64 = 15;

pub struct OAuthStateRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthStateRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        provider: &str,
        state: &str,
        code_verifier: Option<String>,
    ) -> RepositoryResult<Model> {
        let now = Utc::now();
        Ok(oauth_state::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            provider: Set(provider.to_string()),
            state: Set(state.to_string()),
            code_verifier: Set(code_verifier),
            expires_at: Set(now + Duration::minutes(OAUTH_STATE_TTL_MINUTES)),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?)
    }

    /// Returns and deletes an unexpired state. Only the caller whose delete
    /// removed the row gets it back.
    pub async fn consume(&self, provider: &str, state: &str) -> RepositoryResult<Option<Model>> {
        let found = OAuthState::find()
            .filter(oauth_state::Column::Provider.eq(provider))
            .filter(oauth_state::Column::State.eq(state))
            .filter(oauth_state::Column::ExpiresAt.gt(Utc::now()))
            .one(&*self.db)
            .await?;

        let Some(model) = found else {
            return Ok(None);
        };
        let deleted = OAuthState::delete_by_id(model.id).exec(&*self.db).await?;
        Ok((deleted.rows_affected == 1).then_some(model))
    }

    pub async fn cleanup_expired(&self) -> RepositoryResult<u64> {
        let result = OAuthState::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lt(Utc::now()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
