//! # Paginated Fetcher
//!
//! Walks offset/limit search endpoints and batches detail lookups. Any
//! request rejected with 401/403 gets exactly one token refresh and one
//! retry; if the retry fails too, the fetch aborts with the original status
//! and nothing fetched so far is returned.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::error::MarketplaceError;
use super::token::{Bearer, TokenManager};
use super::types::{
    Category, Item, ItemEnvelope, Order, Promotion, PromotionKind, SearchPage, SellerPromotion,
};
use crate::config::SyncConfig;
use crate::models::ml_integration;
use crate::repositories::ml_listing::ListingRecord;

pub struct Fetcher<'a> {
    tokens: &'a TokenManager,
    limits: &'a SyncConfig,
    bearer: Bearer,
}

impl<'a> Fetcher<'a> {
    /// Resolves a bearer token up front; expired integrations fail here.
    pub async fn open(
        tokens: &'a TokenManager,
        limits: &'a SyncConfig,
        integration: ml_integration::Model,
    ) -> Result<Self, MarketplaceError> {
        let bearer = tokens.bearer(integration).await?;
        Ok(Self {
            tokens,
            limits,
            bearer,
        })
    }

    pub fn integration(&self) -> &ml_integration::Model {
        &self.bearer.integration
    }

    /// Every listing of the seller, resolved to full item details.
    #[instrument(skip_all, fields(integration_id = %self.bearer.integration.id))]
    pub async fn listings(&mut self) -> Result<Vec<ListingRecord>, MarketplaceError> {
        let path = format!(
            "/users/{}/items/search",
            self.bearer.integration.external_store_id
        );
        let ids: Vec<String> = self.paginate(&path, Vec::new()).await?;
        let items = self.items(&ids).await?;
        let mut records: Vec<ListingRecord> = items.into_iter().map(Item::into_record).collect();
        self.name_categories(&mut records).await?;
        Ok(records)
    }

    /// Fills `category_name`, looking each distinct category up once.
    async fn name_categories(
        &mut self,
        records: &mut [ListingRecord],
    ) -> Result<(), MarketplaceError> {
        let mut names: HashMap<String, Option<String>> = HashMap::new();
        for record in records.iter_mut() {
            let Some(category_id) = record.category_id.clone() else {
                continue;
            };
            if !names.contains_key(&category_id) {
                let name = self.category(&category_id).await?.map(|c| c.name);
                names.insert(category_id.clone(), name);
            }
            record.category_name = names.get(&category_id).cloned().flatten();
        }
        Ok(())
    }

    /// `/categories/{id}`; `None` when the provider no longer knows it.
    pub async fn category(&mut self, id: &str) -> Result<Option<Category>, MarketplaceError> {
        let path = format!("/categories/{id}");
        match self.get_json(&path, &[]).await {
            Ok(category) => Ok(Some(category)),
            Err(MarketplaceError::Upstream { status: 404, .. }) => {
                warn!(category_id = id, "Unknown category; leaving it unnamed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Deals, campaigns and promotion packs of the seller, in that order.
    #[instrument(skip_all, fields(integration_id = %self.bearer.integration.id))]
    pub async fn promotions(&mut self) -> Result<Vec<SellerPromotion>, MarketplaceError> {
        let store_id = self.bearer.integration.external_store_id.clone();
        let mut promotions = Vec::new();
        for kind in PromotionKind::ALL {
            let found: Vec<Promotion> = self
                .paginate(&kind.search_path(&store_id), Vec::new())
                .await?;
            promotions.extend(found.into_iter().map(|p| p.into_seller(kind)));
        }
        Ok(promotions)
    }

    /// Paid orders created in `[from, to]`.
    #[instrument(skip_all, fields(integration_id = %self.bearer.integration.id))]
    pub async fn paid_orders(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, MarketplaceError> {
        let query = vec![
            (
                "seller".to_string(),
                self.bearer.integration.external_store_id.clone(),
            ),
            ("order.status".to_string(), "paid".to_string()),
            ("order.date_created.from".to_string(), iso(from)),
            ("order.date_created.to".to_string(), iso(to)),
            ("sort".to_string(), "date_asc".to_string()),
        ];
        self.paginate("/orders/search", query).await
    }

    /// Multi-get in chunks of `item_batch_size`. Entries the provider
    /// answers with a non-200 code are skipped.
    pub async fn items(&mut self, ids: &[String]) -> Result<Vec<Item>, MarketplaceError> {
        let chunk_size = self.limits.item_batch_size.max(1);
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(chunk_size) {
            let query = vec![("ids".to_string(), chunk.join(","))];
            let envelopes: Vec<ItemEnvelope> = self.get_json("/items", &query).await?;
            for envelope in envelopes {
                if envelope.code != 200 {
                    warn!(code = envelope.code, "Item lookup returned an error entry; skipping");
                    continue;
                }
                match serde_json::from_value::<Item>(envelope.body) {
                    Ok(item) => items.push(item),
                    Err(e) => {
                        return Err(MarketplaceError::MalformedResponse(format!("item body: {e}")));
                    }
                }
            }
        }
        Ok(items)
    }

    /// Accumulates `results` until an empty page, `offset >= paging.total`
    /// or the `max_items` ceiling.
    pub async fn paginate<T: DeserializeOwned>(
        &mut self,
        path: &str,
        base_query: Vec<(String, String)>,
    ) -> Result<Vec<T>, MarketplaceError> {
        let limit = self.limits.page_size.max(1) as u64;
        let max_items = self.limits.max_items;
        let mut results: Vec<T> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let mut query = base_query.clone();
            query.push(("offset".to_string(), offset.to_string()));
            query.push(("limit".to_string(), limit.to_string()));

            let page: SearchPage<T> = self.get_json(path, &query).await?;
            counter!("ml_pages_fetched_total").increment(1);
            let received = page.results.len() as u64;
            debug!(path, offset, received, total = page.paging.total, "Fetched page");

            if received == 0 {
                break;
            }
            results.extend(page.results);
            if results.len() >= max_items {
                warn!(
                    path,
                    max_items,
                    total = page.paging.total,
                    "Item ceiling reached; stopping pagination"
                );
                results.truncate(max_items);
                break;
            }
            offset += received;
            if offset >= page.paging.total {
                break;
            }
        }
        Ok(results)
    }

    /// GET with the single refresh-and-retry on 401/403.
    pub async fn get_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, MarketplaceError> {
        let response = self.send(path, query).await?;
        let status = response.status();
        if status.is_success() {
            return parse(path, response).await;
        }
        if !is_auth_failure(status) {
            return Err(upstream(path, response).await);
        }

        let original = upstream(path, response).await;
        warn!(
            path,
            status = status.as_u16(),
            "Mercado Livre rejected the token; refreshing once"
        );
        counter!("ml_auth_retries_total").increment(1);
        self.bearer = self
            .tokens
            .refresh(self.bearer.integration.clone())
            .await?;

        let retry = self.send(path, query).await?;
        if retry.status().is_success() {
            return parse(path, retry).await;
        }
        warn!(
            path,
            retry_status = retry.status().as_u16(),
            "Retry after refresh failed; aborting fetch"
        );
        Err(original)
    }

    async fn send(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response, MarketplaceError> {
        let oauth = self.tokens.oauth();
        Ok(oauth
            .http()
            .get(format!("{}{}", oauth.api_base(), path))
            .bearer_auth(&self.bearer.access_token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?)
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn iso(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

async fn parse<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, MarketplaceError> {
    response
        .json()
        .await
        .map_err(|e| MarketplaceError::MalformedResponse(format!("{path}: {e}")))
}

async fn upstream(path: &str, response: reqwest::Response) -> MarketplaceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    MarketplaceError::Upstream {
        status,
        path: path.to_string(),
        body,
    }
}
