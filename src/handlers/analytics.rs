//! Sales analytics over live Mercado Livre orders.

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::analytics::{
    DailyReport, DateRange, OrderSource, ProductCatalog, ProductReport, RevenueMode,
    daily_report, product_report,
};
use crate::auth::TenantContext;
use crate::error::ApiError;
use crate::marketplace::types::Order;
use crate::repositories::{MlMappingRepository, ProductRepository};
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyQuery {
    /// First merchant-local day, inclusive
    pub from: NaiveDate,
    /// Last merchant-local day, inclusive
    pub to: NaiveDate,
    #[serde(default)]
    pub mode: RevenueMode,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

async fn load_orders(
    state: &AppState,
    company_id: Uuid,
    range: &DateRange,
) -> Result<Vec<Order>, ApiError> {
    let tokens = state.token_manager();
    let integrations = state.integrations();
    let source = OrderSource {
        tokens: &tokens,
        integrations: &integrations,
        limits: &state.config.sync,
    };
    Ok(source
        .paid_orders(company_id, range, state.merchant_offset)
        .await?)
}

#[utoipa::path(
    get,
    path = "/analytics/daily",
    security(("bearer_auth" = [])),
    params(DailyQuery),
    responses(
        (status = 200, description = "Zero-filled daily revenue", body = DailyReport),
        (status = 400, description = "Invalid range", body = ApiError),
        (status = 502, description = "Marketplace failure", body = ApiError)
    ),
    tag = "analytics"
)]
pub async fn daily(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<DailyQuery>, QueryRejection>,
) -> Result<Json<DailyReport>, ApiError> {
    let Query(query) = query?;
    let range = DateRange::new(query.from, query.to)?;
    let orders = load_orders(&state, tenant.company_id, &range).await?;
    Ok(Json(daily_report(
        &orders,
        &range,
        state.merchant_offset,
        query.mode,
    )))
}

#[utoipa::path(
    get,
    path = "/analytics/products",
    security(("bearer_auth" = [])),
    params(ProductsQuery),
    responses(
        (status = 200, description = "Per-SKU sales with kit allocation", body = ProductReport),
        (status = 400, description = "Invalid range", body = ApiError),
        (status = 502, description = "Marketplace failure", body = ApiError)
    ),
    tag = "analytics"
)]
pub async fn products(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<ProductsQuery>, QueryRejection>,
) -> Result<Json<ProductReport>, ApiError> {
    let Query(query) = query?;
    let range = DateRange::new(query.from, query.to)?;
    let orders = load_orders(&state, tenant.company_id, &range).await?;

    let mappings = MlMappingRepository::new(state.db.clone())
        .list(tenant.company_id)
        .await?;
    let mut skus: BTreeSet<String> = mappings.iter().map(|m| m.product_sku.clone()).collect();
    skus.extend(
        orders
            .iter()
            .flat_map(|o| &o.order_items)
            .filter_map(|line| line.item.seller_sku.clone()),
    );

    let products = ProductRepository::new(state.db.clone());
    let wanted: Vec<String> = skus.iter().cloned().collect();
    let mut catalog = products.find_by_skus(tenant.company_id, &wanted).await?;
    let components: Vec<String> = catalog
        .iter()
        .flat_map(|p| &p.components)
        .map(|c| c.component_sku.clone())
        .filter(|sku| !skus.contains(sku))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    catalog.extend(products.find_by_skus(tenant.company_id, &components).await?);

    let catalog = ProductCatalog::new(mappings, catalog);
    Ok(Json(product_report(
        &orders,
        &range,
        state.merchant_offset,
        &catalog,
    )))
}
