//! # Mercado Livre Handlers
//!
//! Connection flow (connection token, authorize redirect, callback),
//! integration management, listing sync and listing-to-product mappings.
//! `connect` and `callback` are reached by the browser without a bearer
//! token; the company comes from the connection token or the OAuth state.

use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::required_text;
use crate::auth::TenantContext;
use crate::error::{ApiError, rejected};
use crate::marketplace::oauth::{PROVIDER, generate_state};
use crate::marketplace::types::SellerPromotion;
use crate::marketplace::{Fetcher, ListingSync, Pkce, SyncSummary};
use crate::models::ml_integration::{self, IntegrationStatus};
use crate::models::{ml_listing, ml_product_mapping};
use crate::money::from_cents;
use crate::repositories::ml_mapping::MappingInput;
use crate::repositories::oauth_state::OAUTH_STATE_TTL_MINUTES;
use crate::repositories::{
    ConnectionTokenRepository, MlListingRepository, MlMappingRepository, OAuthStateRepository,
};
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionTokenResponse {
    /// Single use; pass as `?token=` to the connect endpoint
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Ready-made connect path carrying the token
    pub connect_path: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConnectQuery {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeResponse {
    pub authorize_url: String,
    /// When the OAuth state behind this URL stops being accepted
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the seller declines
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub external_store_id: String,
    pub nickname: Option<String>,
    /// `expired` once the 365-day window has lapsed, otherwise the stored status
    pub status: String,
    pub connected_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
}

impl From<ml_integration::Model> for IntegrationResponse {
    fn from(model: ml_integration::Model) -> Self {
        let status = if model.is_expired() {
            "expired"
        } else {
            match model.status {
                IntegrationStatus::Active => "active",
                IntegrationStatus::Error => "error",
            }
        };
        Self {
            status: status.to_string(),
            expires_at: model.expires_at(),
            has_access_token: model.access_token_ciphertext.is_some(),
            has_refresh_token: model.refresh_token_ciphertext.is_some(),
            id: model.id,
            external_store_id: model.external_store_id,
            nickname: model.nickname,
            connected_at: model.connected_at,
            token_expires_at: model.token_expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    pub listings_deleted: u64,
    pub mappings_deleted: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListingsQuery {
    pub integration_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListingResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub integration_id: Uuid,
    pub external_listing_id: String,
    pub title: String,
    pub price: Decimal,
    pub available_quantity: i32,
    pub status: String,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub seller_sku: Option<String>,
    pub variation_count: i32,
    pub last_synced_at: DateTime<Utc>,
}

impl From<ml_listing::Model> for ListingResponse {
    fn from(model: ml_listing::Model) -> Self {
        Self {
            id: model.id,
            integration_id: model.integration_id,
            external_listing_id: model.external_listing_id,
            title: model.title,
            price: from_cents(model.price_cents),
            available_quantity: model.available_quantity,
            status: model.status,
            permalink: model.permalink,
            thumbnail: model.thumbnail,
            category_id: model.category_id,
            category_name: model.category_name,
            seller_sku: model.seller_sku,
            variation_count: model.variation_count,
            last_synced_at: model.last_synced_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MappingRequest {
    #[schema(value_type = String)]
    pub integration_id: Uuid,
    pub external_listing_id: String,
    /// Omit or leave empty to map the whole listing
    pub variation_id: Option<String>,
    pub product_sku: String,
}

impl MappingRequest {
    fn validate(self) -> Result<MappingInput, ApiError> {
        Ok(MappingInput {
            integration_id: self.integration_id,
            external_listing_id: required_text("external_listing_id", &self.external_listing_id)?,
            variation_id: self.variation_id.map(|v| v.trim().to_string()),
            product_sku: required_text("product_sku", &self.product_sku)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MappingResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub integration_id: Uuid,
    pub external_listing_id: String,
    /// `null` when the whole listing is mapped
    pub variation_id: Option<String>,
    pub product_sku: String,
    pub created_at: DateTime<Utc>,
}

impl From<ml_product_mapping::Model> for MappingResponse {
    fn from(model: ml_product_mapping::Model) -> Self {
        Self {
            id: model.id,
            integration_id: model.integration_id,
            external_listing_id: model.external_listing_id,
            variation_id: Some(model.variation_id).filter(|v| !v.is_empty()),
            product_sku: model.product_sku,
            created_at: model.created_at,
        }
    }
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Persists a fresh state and PKCE verifier for `company_id` and builds the
/// provider's authorize URL.
async fn begin_authorization(
    state: &AppState,
    company_id: Uuid,
) -> Result<(Url, DateTime<Utc>), ApiError> {
    let oauth = state.oauth();
    oauth.check_credentials()?;
    let oauth_state = generate_state();
    let pkce = Pkce::generate();
    let url = oauth.authorize_url(&oauth_state, &pkce.challenge)?;
    let stored = OAuthStateRepository::new(state.db.clone())
        .create(company_id, PROVIDER, &oauth_state, Some(pkce.verifier))
        .await?;
    tracing::info!(
        company_id = %company_id,
        ttl_minutes = OAUTH_STATE_TTL_MINUTES,
        "Mercado Livre authorization started"
    );
    Ok((url, stored.expires_at))
}

#[utoipa::path(
    post,
    path = "/integrations/mercadolivre/connection-token",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Single-use token valid for one hour", body = ConnectionTokenResponse)
    ),
    tag = "mercadolivre"
)]
pub async fn create_connection_token(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<(StatusCode, Json<ConnectionTokenResponse>), ApiError> {
    let issued = ConnectionTokenRepository::new(state.db.clone())
        .issue(tenant.company_id, tenant.user_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ConnectionTokenResponse {
            connect_path: format!("/integrations/mercadolivre/connect?token={}", issued.token),
            token: issued.token,
            expires_at: issued.expires_at,
        }),
    ))
}

/// Browser entry point: trades a connection token for a redirect to the
/// Mercado Livre authorization page.
#[utoipa::path(
    get,
    path = "/integrations/mercadolivre/connect",
    params(ConnectQuery),
    responses(
        (status = 302, description = "Redirect to the authorization page"),
        (status = 400, description = "Invalid or expired connection token", body = ApiError),
        (status = 500, description = "Marketplace client not configured", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn connect(
    State(state): State<AppState>,
    query: Result<Query<ConnectQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    state.oauth().check_credentials()?;
    let consumed = ConnectionTokenRepository::new(state.db.clone())
        .consume(query.token.trim())
        .await?
        .ok_or_else(|| {
            rejected(
                "invalid_connection_token",
                "invalid or expired connection token",
            )
        })?;
    let (url, _) = begin_authorization(&state, consumed.company_id).await?;
    Ok(found(url.as_str()))
}

#[utoipa::path(
    post,
    path = "/integrations/mercadolivre/authorize",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authorization URL", body = AuthorizeResponse),
        (status = 500, description = "Marketplace client not configured", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn authorize(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let (url, expires_at) = begin_authorization(&state, tenant.company_id).await?;
    Ok(Json(AuthorizeResponse {
        authorize_url: url.into(),
        expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/integrations/mercadolivre/callback",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Integration stored; redirect to the frontend"),
        (status = 400, description = "Invalid state or authorization declined", body = ApiError),
        (status = 502, description = "Token exchange or profile lookup failed", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "Mercado Livre authorization declined");
        return Err(rejected(
            "authorization_declined",
            format!("authorization declined: {error}"),
        ));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(rejected(
            "invalid_oauth_state",
            "code and state are required",
        ));
    };

    let states = OAuthStateRepository::new(state.db.clone());
    let purged = states.cleanup_expired().await?;
    if purged > 0 {
        tracing::debug!(purged, "Expired OAuth states removed");
    }
    let pending = states
        .consume(PROVIDER, &oauth_state)
        .await?
        .ok_or_else(|| rejected("invalid_oauth_state", "invalid or expired OAuth state"))?;

    let oauth = state.oauth();
    let tokens = oauth
        .exchange_code(&code, pending.code_verifier.as_deref())
        .await?;
    let profile = oauth.current_user(&tokens.access_token).await?;

    let integration = state
        .integrations()
        .upsert_connected(pending.company_id, &profile.id, profile.nickname, &tokens)
        .await?;
    tracing::info!(
        company_id = %pending.company_id,
        integration_id = %integration.id,
        store_id = %integration.external_store_id,
        "Mercado Livre integration connected"
    );

    let target = format!(
        "{}/integrations?mercadolivre=connected",
        state.config.mercadolivre.frontend_url.trim_end_matches('/')
    );
    Ok(found(&target))
}

#[utoipa::path(
    get,
    path = "/integrations/mercadolivre",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Integrations with derived status", body = [IntegrationResponse])
    ),
    tag = "mercadolivre"
)]
pub async fn list_integrations(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<IntegrationResponse>>, ApiError> {
    let integrations = state.integrations().list(tenant.company_id).await?;
    Ok(Json(
        integrations
            .into_iter()
            .map(IntegrationResponse::from)
            .collect(),
    ))
}

#[utoipa::path(
    delete,
    path = "/integrations/mercadolivre/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Integration, listings and mappings deleted", body = PurgeResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn delete_integration(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let purged = state
        .integrations()
        .delete_with_purge(tenant.company_id, id)
        .await?;
    Ok(Json(PurgeResponse {
        listings_deleted: purged.listings,
        mappings_deleted: purged.mappings,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromotionsResponse {
    #[schema(value_type = String)]
    pub integration_id: Uuid,
    pub promotions: Vec<SellerPromotion>,
}

#[utoipa::path(
    get,
    path = "/integrations/mercadolivre/{id}/promotions",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Deals, campaigns and promotion packs of the store", body = PromotionsResponse),
        (status = 400, description = "Integration awaits a reconnect", body = ApiError),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 409, description = "Integration window has lapsed", body = ApiError),
        (status = 502, description = "Marketplace failure", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn list_promotions(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PromotionsResponse>, ApiError> {
    let integration = state.integrations().get(tenant.company_id, id).await?;
    if integration.status != IntegrationStatus::Active {
        return Err(rejected(
            "integration_inactive",
            "integration must be reconnected before it can be queried",
        ));
    }
    let tokens = state.token_manager();
    let mut fetcher = Fetcher::open(&tokens, &state.config.sync, integration).await?;
    let promotions = fetcher.promotions().await?;
    Ok(Json(PromotionsResponse {
        integration_id: id,
        promotions,
    }))
}

#[utoipa::path(
    post,
    path = "/integrations/mercadolivre/sync",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sync counts", body = SyncSummary),
        (status = 409, description = "An integration can no longer be renewed", body = ApiError),
        (status = 502, description = "Marketplace failure; nothing was written", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn sync_listings(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<SyncSummary>, ApiError> {
    let tokens = state.token_manager();
    let integrations = state.integrations();
    let listings = MlListingRepository::new(state.db.clone());
    let sync = ListingSync {
        tokens: &tokens,
        integrations: &integrations,
        listings: &listings,
        limits: &state.config.sync,
    };
    Ok(Json(sync.run(tenant.company_id).await?))
}

#[utoipa::path(
    get,
    path = "/integrations/mercadolivre/listings",
    security(("bearer_auth" = [])),
    params(ListingsQuery),
    responses(
        (status = 200, description = "Stored listings", body = [ListingResponse])
    ),
    tag = "mercadolivre"
)]
pub async fn list_listings(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<ListingsQuery>, QueryRejection>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let Query(query) = query?;
    let listings = MlListingRepository::new(state.db.clone())
        .list(tenant.company_id, query.integration_id)
        .await?;
    Ok(Json(listings.into_iter().map(ListingResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/integrations/mercadolivre/mappings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Listing-to-product mappings", body = [MappingResponse])
    ),
    tag = "mercadolivre"
)]
pub async fn list_mappings(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<MappingResponse>>, ApiError> {
    let mappings = MlMappingRepository::new(state.db.clone())
        .list(tenant.company_id)
        .await?;
    Ok(Json(mappings.into_iter().map(MappingResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/integrations/mercadolivre/mappings",
    security(("bearer_auth" = [])),
    request_body = MappingRequest,
    responses(
        (status = 201, description = "Mapping created", body = MappingResponse),
        (status = 400, description = "Unknown product", body = ApiError),
        (status = 409, description = "Listing already mapped", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn create_mapping(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<MappingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MappingResponse>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let mapping = MlMappingRepository::new(state.db.clone())
        .create(tenant.company_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(mapping.into())))
}

#[utoipa::path(
    delete,
    path = "/integrations/mercadolivre/mappings/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Mapping id")),
    responses(
        (status = 204, description = "Mapping deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "mercadolivre"
)]
pub async fn delete_mapping(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    MlMappingRepository::new(state.db.clone())
        .delete(tenant.company_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
