//! # Server Configuration
//!
//! Shared state, router assembly and the OpenAPI document.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use chrono::{FixedOffset, NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::marketplace::{MercadoLivreOAuth, TokenManager};
use crate::repositories::MlIntegrationRepository;
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::telemetry;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub crypto_key: CryptoKey,
    pub http: reqwest::Client,
    pub objects: Arc<dyn ObjectStore>,
    pub merchant_offset: FixedOffset,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        crypto_key: CryptoKey,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .user_agent(concat!("backoffice/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let merchant_offset = config.analytics.merchant_offset()?;
        let objects: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(config.storage.root.clone()));
        Ok(Self {
            config,
            db: Arc::new(db),
            crypto_key,
            http,
            objects,
            merchant_offset,
        })
    }

    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = objects;
        self
    }

    /// Calendar date in the merchant's offset.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.merchant_offset).date_naive()
    }

    pub fn integrations(&self) -> MlIntegrationRepository {
        MlIntegrationRepository::new(self.db.clone(), self.crypto_key.clone())
    }

    pub fn oauth(&self) -> MercadoLivreOAuth {
        MercadoLivreOAuth::new(self.http.clone(), self.config.mercadolivre.clone())
    }

    pub fn token_manager(&self) -> TokenManager {
        TokenManager::new(self.oauth(), self.integrations())
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let ml = "/integrations/mercadolivre";

    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route(
            "/banks",
            get(handlers::banks::list_banks).post(handlers::banks::create_bank),
        )
        .route(
            "/banks/{id}",
            get(handlers::banks::get_bank)
                .patch(handlers::banks::update_bank)
                .delete(handlers::banks::delete_bank),
        )
        .route("/banks/{id}/history", get(handlers::banks::bank_history))
        .route(
            "/contacts",
            get(handlers::contacts::list_contacts).post(handlers::contacts::create_contact),
        )
        .route(
            "/contacts/{id}",
            get(handlers::contacts::get_contact)
                .put(handlers::contacts::update_contact)
                .delete(handlers::contacts::delete_contact),
        )
        .route(
            "/categories",
            get(handlers::categories::list_categories)
                .post(handlers::categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        .route(
            "/payables",
            get(handlers::entries::list_payables).post(handlers::entries::create_payable),
        )
        .route(
            "/payables/{id}",
            get(handlers::entries::get_payable)
                .patch(handlers::entries::update_payable)
                .delete(handlers::entries::delete_payable),
        )
        .route("/payables/{id}/pay", post(handlers::entries::pay_payable))
        .route(
            "/payables/{id}/reverse",
            post(handlers::entries::reverse_payable),
        )
        .route(
            "/receivables",
            get(handlers::entries::list_receivables).post(handlers::entries::create_receivable),
        )
        .route(
            "/receivables/{id}",
            get(handlers::entries::get_receivable)
                .patch(handlers::entries::update_receivable)
                .delete(handlers::entries::delete_receivable),
        )
        .route(
            "/receivables/{id}/receive",
            post(handlers::entries::receive_receivable),
        )
        .route(
            "/receivables/{id}/reverse",
            post(handlers::entries::reverse_receivable),
        )
        .route(
            "/recurring",
            get(handlers::recurring::list_rules).post(handlers::recurring::create_rule),
        )
        .route(
            "/recurring/{id}",
            get(handlers::recurring::get_rule)
                .put(handlers::recurring::update_rule)
                .delete(handlers::recurring::delete_rule),
        )
        .route(
            "/recurring/{id}/generate",
            post(handlers::recurring::generate_rule),
        )
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/{id}",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/products/{id}/image",
            put(handlers::products::upload_product_image),
        )
        .route("/storage/{*key}", get(handlers::storage::get_object))
        .route("/analytics/daily", get(handlers::analytics::daily))
        .route("/analytics/products", get(handlers::analytics::products))
        .route(
            ml,
            get(handlers::mercadolivre::list_integrations),
        )
        .route(
            &format!("{ml}/connection-token"),
            post(handlers::mercadolivre::create_connection_token),
        )
        .route(
            &format!("{ml}/authorize"),
            post(handlers::mercadolivre::authorize),
        )
        .route(
            &format!("{ml}/sync"),
            post(handlers::mercadolivre::sync_listings),
        )
        .route(
            &format!("{ml}/listings"),
            get(handlers::mercadolivre::list_listings),
        )
        .route(
            &format!("{ml}/mappings"),
            get(handlers::mercadolivre::list_mappings).post(handlers::mercadolivre::create_mapping),
        )
        .route(
            &format!("{ml}/mappings/{{id}}"),
            axum::routing::delete(handlers::mercadolivre::delete_mapping),
        )
        .route(
            &format!("{ml}/{{id}}"),
            axum::routing::delete(handlers::mercadolivre::delete_integration),
        )
        .route(
            &format!("{ml}/{{id}}/promotions"),
            get(handlers::mercadolivre::list_promotions),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/", get(handlers::root))
        .route(
            &format!("{ml}/connect"),
            get(handlers::mercadolivre::connect),
        )
        .route(
            &format!("{ml}/callback"),
            get(handlers::mercadolivre::callback),
        );

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let crypto_key = CryptoKey::new(config.crypto_key.clone().unwrap_or_default())
        .context("BACKOFFICE_CRYPTO_KEY must decode to 32 bytes")?;
    let addr = config
        .bind_addr()
        .with_context(|| format!("invalid server address {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState::new(Arc::new(config), db, crypto_key)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::me,
        crate::handlers::banks::list_banks,
        crate::handlers::banks::create_bank,
        crate::handlers::banks::get_bank,
        crate::handlers::banks::update_bank,
        crate::handlers::banks::delete_bank,
        crate::handlers::banks::bank_history,
        crate::handlers::contacts::list_contacts,
        crate::handlers::contacts::create_contact,
        crate::handlers::contacts::get_contact,
        crate::handlers::contacts::update_contact,
        crate::handlers::contacts::delete_contact,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::get_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::entries::list_payables,
        crate::handlers::entries::create_payable,
        crate::handlers::entries::get_payable,
        crate::handlers::entries::update_payable,
        crate::handlers::entries::delete_payable,
        crate::handlers::entries::pay_payable,
        crate::handlers::entries::reverse_payable,
        crate::handlers::entries::list_receivables,
        crate::handlers::entries::create_receivable,
        crate::handlers::entries::get_receivable,
        crate::handlers::entries::update_receivable,
        crate::handlers::entries::delete_receivable,
        crate::handlers::entries::receive_receivable,
        crate::handlers::entries::reverse_receivable,
        crate::handlers::recurring::list_rules,
        crate::handlers::recurring::create_rule,
        crate::handlers::recurring::get_rule,
        crate::handlers::recurring::update_rule,
        crate::handlers::recurring::delete_rule,
        crate::handlers::recurring::generate_rule,
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::upload_product_image,
        crate::handlers::storage::get_object,
        crate::handlers::analytics::daily,
        crate::handlers::analytics::products,
        crate::handlers::mercadolivre::create_connection_token,
        crate::handlers::mercadolivre::connect,
        crate::handlers::mercadolivre::authorize,
        crate::handlers::mercadolivre::callback,
        crate::handlers::mercadolivre::list_integrations,
        crate::handlers::mercadolivre::delete_integration,
        crate::handlers::mercadolivre::sync_listings,
        crate::handlers::mercadolivre::list_listings,
        crate::handlers::mercadolivre::list_mappings,
        crate::handlers::mercadolivre::create_mapping,
        crate::handlers::mercadolivre::delete_mapping,
        crate::handlers::mercadolivre::list_promotions,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::auth::TenantContext,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "Back-office API",
        description = "Payables, receivables, banks, products and the Mercado Livre integration",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
