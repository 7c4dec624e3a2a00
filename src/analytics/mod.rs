//! # Sales Analytics
//!
//! Orders are pulled live from Mercado Livre for the requested window and
//! aggregated in memory; nothing is persisted. Calendar days are those of
//! the merchant's fixed UTC offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{self, ApiError};
use crate::marketplace::types::Order;
use crate::marketplace::{Fetcher, MarketplaceError, TokenManager};
use crate::models::ml_integration::IntegrationStatus;
use crate::repositories::MlIntegrationRepository;

pub mod daily;
pub mod products;

pub use daily::{DailyPoint, DailyReport, daily_report};
pub use products::{ProductCatalog, ProductReport, product_report};

/// Longest range accepted, in days (inclusive of both ends).
pub const MAX_RANGE_DAYS: i64 = 366;

/// Orders may be created before the range and closed inside it; the search
/// window starts this many days early and bucketing discards the rest.
const CREATION_LOOKBACK_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RevenueMode {
    /// Order `total_amount`
    #[default]
    Gross,
    /// Sum of `payments[].net_received_amount`, gross when absent
    Net,
}

/// Inclusive merchant-local date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ApiError> {
        if from > to {
            return Err(error::validation("from must not be after to"));
        }
        let days = (to - from).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(error::validation(format!(
                "date range spans {days} days; at most {MAX_RANGE_DAYS} are allowed"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take_while(|day| *day <= self.to)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    /// UTC instants of local midnight opening `from` and closing `to`.
    pub fn utc_bounds(&self, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = local_midnight_utc(self.from, offset);
        let end = local_midnight_utc(self.to, offset) + Duration::days(1) - Duration::milliseconds(1);
        (start, end)
    }
}

fn local_midnight_utc(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = day.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset.local_minus_utc()))))
}

/// Merchant-local calendar day an order counts toward.
pub fn local_day(order: &Order, offset: FixedOffset) -> NaiveDate {
    order.effective_at().with_timezone(&offset).date_naive()
}

/// Loads paid orders from every usable integration of a company.
pub struct OrderSource<'a> {
    pub tokens: &'a TokenManager,
    pub integrations: &'a MlIntegrationRepository,
    pub limits: &'a SyncConfig,
}

impl OrderSource<'_> {
    pub async fn paid_orders(
        &self,
        company_id: Uuid,
        range: &DateRange,
        offset: FixedOffset,
    ) -> Result<Vec<Order>, MarketplaceError> {
        let (start, end) = range.utc_bounds(offset);
        let search_from = start - Duration::days(CREATION_LOOKBACK_DAYS);
        let mut orders = Vec::new();

        for integration in self.integrations.list(company_id).await? {
            if integration.is_expired() || integration.status != IntegrationStatus::Active {
                warn!(
                    integration_id = %integration.id,
                    status = ?integration.status,
                    "Integration excluded from analytics"
                );
                continue;
            }
            let mut fetcher = Fetcher::open(self.tokens, self.limits, integration).await?;
            orders.extend(fetcher.paid_orders(search_from, end).await?);
        }

        info!(company_id = %company_id, orders = orders.len(), "Loaded orders for analytics");
        Ok(orders)
    }
}
