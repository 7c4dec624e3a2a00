//! # Mercado Livre Integration Repository
//!
//! Token sealing happens here so callers only ever see plaintext tokens in
//! memory. Disconnect purges listings and mappings with the integration.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, owned};
use crate::crypto::{self, CryptoKey};
use crate::models::ml_integration::{self, Entity as MlIntegration, IntegrationStatus};
use crate::models::{ml_listing, ml_product_mapping};

/// Tokens returned by a successful exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Counts removed by a disconnect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeSummary {
    pub listings: u64,
    pub mappings: u64,
}

/// Row id derived from the natural key, so a reconnect that lands on the
/// conflict branch keeps the id its tokens are sealed against.
pub fn integration_id(company_id: Uuid, external_store_id: &str) -> Uuid {
    Uuid::new_v5(&company_id, external_store_id.as_bytes())
}

pub struct MlIntegrationRepository {
    db: Arc<DatabaseConnection>,
    crypto_key: CryptoKey,
}

impl MlIntegrationRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    pub async fn list(&self, company_id: Uuid) -> RepositoryResult<Vec<ml_integration::Model>> {
        Ok(MlIntegration::find()
            .filter(ml_integration::Column::CompanyId.eq(company_id))
            .order_by_asc(ml_integration::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<ml_integration::Model> {
        let found = MlIntegration::find_by_id(id).one(&*self.db).await?;
        owned(found, company_id, |i| i.company_id, "Integration")
    }

    /// Creates the integration for `(company, store)` or refreshes the
    /// existing row in place, resetting `connected_at` and status. A single
    /// `INSERT ... ON CONFLICT` statement; the stored refresh token survives
    /// when the provider returned none.
    pub async fn upsert_connected(
        &self,
        company_id: Uuid,
        external_store_id: &str,
        nickname: Option<String>,
        tokens: &TokenPair,
    ) -> RepositoryResult<ml_integration::Model> {
        let now = Utc::now();
        let id = integration_id(company_id, external_store_id);
        let refresh = tokens
            .refresh_token
            .as_deref()
            .map(|token| self.seal(id, token))
            .transpose()?;
        let row = ml_integration::ActiveModel {
            id: Set(id),
            company_id: Set(company_id),
            external_store_id: Set(external_store_id.to_string()),
            nickname: Set(nickname),
            status: Set(IntegrationStatus::Active),
            access_token_ciphertext: Set(Some(self.seal(id, &tokens.access_token)?)),
            refresh_token_ciphertext: Set(refresh),
            token_expires_at: Set(tokens.expires_at),
            connected_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };

        MlIntegration::insert(row)
            .on_conflict(
                OnConflict::columns([
                    ml_integration::Column::CompanyId,
                    ml_integration::Column::ExternalStoreId,
                ])
                .update_columns([
                    ml_integration::Column::Nickname,
                    ml_integration::Column::Status,
                    ml_integration::Column::AccessTokenCiphertext,
                    ml_integration::Column::TokenExpiresAt,
                    ml_integration::Column::ConnectedAt,
                    ml_integration::Column::UpdatedAt,
                ])
                .value(
                    ml_integration::Column::RefreshTokenCiphertext,
                    Expr::cust(
                        "COALESCE(excluded.refresh_token_ciphertext, \
                         ml_integrations.refresh_token_ciphertext)",
                    ),
                )
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        let stored = MlIntegration::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Integration"))?;
        tracing::info!(integration_id = %id, "Mercado Livre integration connected");
        Ok(stored)
    }

    /// Persists a refreshed pair; keeps the stored refresh token when the
    /// provider did not rotate it.
    pub async fn store_refreshed(
        &self,
        integration: ml_integration::Model,
        tokens: &TokenPair,
    ) -> RepositoryResult<ml_integration::Model> {
        let id = integration.id;
        let mut active: ml_integration::ActiveModel = integration.into();
        active.access_token_ciphertext = Set(Some(self.seal(id, &tokens.access_token)?));
        if let Some(refresh) = &tokens.refresh_token {
            active.refresh_token_ciphertext = Set(Some(self.seal(id, refresh)?));
        }
        active.token_expires_at = Set(tokens.expires_at);
        active.status = Set(IntegrationStatus::Active);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn mark_error(
        &self,
        integration: ml_integration::Model,
    ) -> RepositoryResult<ml_integration::Model> {
        let mut active: ml_integration::ActiveModel = integration.into();
        active.status = Set(IntegrationStatus::Error);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub fn access_token(&self, integration: &ml_integration::Model) -> RepositoryResult<Option<String>> {
        self.open(integration.id, integration.access_token_ciphertext.as_deref())
    }

    pub fn refresh_token(
        &self,
        integration: &ml_integration::Model,
    ) -> RepositoryResult<Option<String>> {
        self.open(integration.id, integration.refresh_token_ciphertext.as_deref())
    }

    /// Deletes listings, mappings and the integration in one transaction.
    pub async fn delete_with_purge(
        &self,
        company_id: Uuid,
        id: Uuid,
    ) -> RepositoryResult<PurgeSummary> {
        let txn = self.db.begin().await?;
        let found = MlIntegration::find_by_id(id).one(&txn).await?;
        let integration = owned(found, company_id, |i| i.company_id, "Integration")?;

        let listings = ml_listing::Entity::delete_many()
            .filter(ml_listing::Column::CompanyId.eq(company_id))
            .filter(ml_listing::Column::IntegrationId.eq(integration.id))
            .exec(&txn)
            .await?
            .rows_affected;
        let mappings = ml_product_mapping::Entity::delete_many()
            .filter(ml_product_mapping::Column::CompanyId.eq(company_id))
            .filter(ml_product_mapping::Column::IntegrationId.eq(integration.id))
            .exec(&txn)
            .await?
            .rows_affected;
        MlIntegration::delete_by_id(integration.id)
            .exec(&txn)
            .await?;

        txn.commit().await?;
        tracing::info!(
            integration_id = %id,
            listings,
            mappings,
            "Mercado Livre integration disconnected"
        );
        Ok(PurgeSummary { listings, mappings })
    }

    fn seal(&self, id: Uuid, token: &str) -> RepositoryResult<Vec<u8>> {
        crypto::seal_token(&self.crypto_key, id, token).map_err(|e| {
            tracing::error!(integration_id = %id, error = %e, "Token encryption failed");
            RepositoryError::Database(sea_orm::DbErr::Custom(format!(
                "token encryption failed: {e}"
            )))
        })
    }

    fn open(&self, id: Uuid, sealed: Option<&[u8]>) -> RepositoryResult<Option<String>> {
        sealed
            .map(|bytes| crypto::open_token(&self.crypto_key, id, bytes))
            .transpose()
            .map_err(|e| {
                tracing::error!(integration_id = %id, error = %e, "Token decryption failed");
                RepositoryError::Database(sea_orm::DbErr::Custom(format!(
                    "token decryption failed: {e}"
                )))
            })
    }
}
