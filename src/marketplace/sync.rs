//! # Listing Sync
//!
//! Caller-triggered, per company. Integrations are fetched one after another
//! and every fetch completes before the first listing is written.

use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::MarketplaceError;
use super::fetcher::Fetcher;
use super::token::TokenManager;
use crate::config::SyncConfig;
use crate::models::ml_integration::{self, IntegrationStatus};
use crate::repositories::ml_listing::ListingRecord;
use crate::repositories::{MlIntegrationRepository, MlListingRepository};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncSummary {
    /// Integrations fetched and persisted
    pub integrations: usize,
    /// Integrations past their 365-day window
    pub skipped_expired: usize,
    /// Integrations in `error` status, awaiting a reconnect
    pub skipped_inactive: usize,
    pub fetched: usize,
    pub upserted: usize,
    pub failed: usize,
}

pub struct ListingSync<'a> {
    pub tokens: &'a TokenManager,
    pub integrations: &'a MlIntegrationRepository,
    pub listings: &'a MlListingRepository,
    pub limits: &'a SyncConfig,
}

impl ListingSync<'_> {
    #[instrument(skip(self))]
    pub async fn run(&self, company_id: Uuid) -> Result<SyncSummary, MarketplaceError> {
        let mut summary = SyncSummary::default();
        let mut fetched: Vec<(ml_integration::Model, Vec<ListingRecord>)> = Vec::new();

        for integration in self.integrations.list(company_id).await? {
            if integration.is_expired() {
                info!(integration_id = %integration.id, "Skipping expired integration");
                summary.skipped_expired += 1;
                continue;
            }
            if integration.status != IntegrationStatus::Active {
                warn!(integration_id = %integration.id, "Skipping integration in error status");
                summary.skipped_inactive += 1;
                continue;
            }
            let mut fetcher = Fetcher::open(self.tokens, self.limits, integration).await?;
            let records = fetcher.listings().await?;
            summary.fetched += records.len();
            fetched.push((fetcher.integration().clone(), records));
        }

        for (integration, records) in &fetched {
            let report = self
                .listings
                .upsert_batch(company_id, integration.id, records)
                .await;
            summary.upserted += report.upserted;
            summary.failed += report.failed;
        }
        summary.integrations = fetched.len();

        info!(
            integrations = summary.integrations,
            fetched = summary.fetched,
            upserted = summary.upserted,
            failed = summary.failed,
            "Mercado Livre listing sync finished"
        );
        Ok(summary)
    }
}
