//! # Listing Upsert Writer
//!
//! Listings are written with `INSERT ... ON CONFLICT (company_id,
//! integration_id, external_listing_id) DO UPDATE`, one statement per
//! listing. A failing listing is logged and counted; the rest of the batch
//! still commits.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use std::sync::Arc;
use uuid::Uuid;

use super::RepositoryResult;
use crate::models::ml_listing::{self, Entity as MlListing};

/// Listing fields as fetched from the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub external_listing_id: String,
    pub title: String,
    pub price_cents: i64,
    pub available_quantity: i32,
    pub status: String,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub seller_sku: Option<String>,
    pub variation_count: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub upserted: usize,
    pub failed: usize,
}

pub struct MlListingRepository {
    db: Arc<DatabaseConnection>,
}

impl MlListingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        integration_id: Option<Uuid>,
    ) -> RepositoryResult<Vec<ml_listing::Model>> {
        let mut query = MlListing::find().filter(ml_listing::Column::CompanyId.eq(company_id));
        if let Some(integration_id) = integration_id {
            query = query.filter(ml_listing::Column::IntegrationId.eq(integration_id));
        }
        Ok(query
            .order_by_asc(ml_listing::Column::Title)
            .all(&*self.db)
            .await?)
    }

    /// Inserts or refreshes one listing by its natural key.
    pub async fn upsert(
        &self,
        company_id: Uuid,
        integration_id: Uuid,
        record: &ListingRecord,
        synced_at: DateTime<Utc>,
    ) -> Result<(), sea_orm::DbErr> {
        let row = ml_listing::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            integration_id: Set(integration_id),
            external_listing_id: Set(record.external_listing_id.clone()),
            title: Set(record.title.clone()),
            price_cents: Set(record.price_cents),
            available_quantity: Set(record.available_quantity),
            status: Set(record.status.clone()),
            permalink: Set(record.permalink.clone()),
            thumbnail: Set(record.thumbnail.clone()),
            category_id: Set(record.category_id.clone()),
            category_name: Set(record.category_name.clone()),
            seller_sku: Set(record.seller_sku.clone()),
            variation_count: Set(record.variation_count),
            last_synced_at: Set(synced_at),
            created_at: Set(synced_at),
        };

        MlListing::insert(row)
            .on_conflict(
                OnConflict::columns([
                    ml_listing::Column::CompanyId,
                    ml_listing::Column::IntegrationId,
                    ml_listing::Column::ExternalListingId,
                ])
                .update_columns([
                    ml_listing::Column::Title,
                    ml_listing::Column::PriceCents,
                    ml_listing::Column::AvailableQuantity,
                    ml_listing::Column::Status,
                    ml_listing::Column::Permalink,
                    ml_listing::Column::Thumbnail,
                    ml_listing::Column::CategoryId,
                    ml_listing::Column::CategoryName,
                    ml_listing::Column::SellerSku,
                    ml_listing::Column::VariationCount,
                    ml_listing::Column::LastSyncedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;
        Ok(())
    }

    /// Writes every record independently, logging and counting failures.
    pub async fn upsert_batch(
        &self,
        company_id: Uuid,
        integration_id: Uuid,
        records: &[ListingRecord],
    ) -> UpsertReport {
        let synced_at = Utc::now();
        let mut report = UpsertReport::default();
        for record in records {
            match self
                .upsert(company_id, integration_id, record, synced_at)
                .await
            {
                Ok(()) => {
                    report.upserted += 1;
                    metrics::counter!("ml_listing_upserts_total", "outcome" => "ok").increment(1);
                }
                Err(error) => {
                    report.failed += 1;
                    metrics::counter!("ml_listing_upserts_total", "outcome" => "error")
                        .increment(1);
                    tracing::warn!(
                        integration_id = %integration_id,
                        listing = %record.external_listing_id,
                        error = %error,
                        "Listing upsert failed; continuing"
                    );
                }
            }
        }
        report
    }
}
