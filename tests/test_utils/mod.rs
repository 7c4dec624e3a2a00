//! Test utilities shared by the integration suites.
//!
//! Every test gets its own in-memory SQLite database with all migrations
//! applied, a temporary object store and a seeded company with one user.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use backoffice::{
    auth::issue_token,
    config::{AppConfig, MercadoLivreConfig, SyncConfig},
    crypto::CryptoKey,
    models::{company, user},
    server::{AppState, create_app},
    storage::LocalObjectStore,
};
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Configuration with a JWT secret and Mercado Livre pointed at `ml_base`.
pub fn test_config(ml_base: Option<&str>) -> AppConfig {
    let base = ml_base.unwrap_or("http://127.0.0.1:9").to_string();
    AppConfig {
        jwt_secret: Some(JWT_SECRET.to_string()),
        crypto_key: Some(vec![7u8; 32]),
        mercadolivre: MercadoLivreConfig {
            client_id: Some("test-client".to_string()),
            client_secret: Some("test-secret".to_string()),
            redirect_uri: Some("http://localhost:3000/integrations/mercadolivre/callback".to_string()),
            api_base: base.clone(),
            auth_base: base,
            frontend_url: "http://frontend.test".to_string(),
        },
        sync: SyncConfig {
            page_size: 2,
            max_items: 100,
            item_batch_size: 2,
        },
        ..Default::default()
    }
}

/// A tenant the tests act as.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
}

/// Inserts a company and a user whose default company it is.
pub async fn seed_tenant(db: &DatabaseConnection, name: &str) -> Result<Tenant> {
    let now = Utc::now();
    let company_id = Uuid::new_v4();
    company::ActiveModel {
        id: Set(company_id),
        name: Set(name.to_string()),
        document: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let user_id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(user_id),
        email: Set(format!("{user_id}@example.test")),
        name: Set(Some(format!("{name} owner"))),
        default_company_id: Set(Some(company_id)),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    let token = issue_token(JWT_SECRET, user_id, Duration::hours(1))?;
    Ok(Tenant {
        company_id,
        user_id,
        token,
    })
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub tenant: Tenant,
    _storage: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::with_config(test_config(None)).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let db = setup_test_db().await?;
        let crypto_key = CryptoKey::new(config.crypto_key.clone().unwrap_or_default())?;
        let storage = tempfile::tempdir()?;
        let state = AppState::new(Arc::new(config), db, crypto_key)?
            .with_object_store(Arc::new(LocalObjectStore::new(storage.path())));
        let tenant = seed_tenant(&state.db, "Acme").await?;
        let router = create_app(state.clone());
        Ok(Self {
            state,
            router,
            tenant,
            _storage: storage,
        })
    }

    /// Seeds another company to exercise isolation.
    pub async fn other_tenant(&self) -> Result<Tenant> {
        seed_tenant(&self.state.db, "Globex").await
    }

    pub async fn raw(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    /// Sends a JSON request as `tenant` and returns status plus decoded body.
    pub async fn send_as(
        &self,
        tenant: &Tenant,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", tenant.token));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json)?)
            }
            None => Body::empty(),
        };
        let response = self.raw(builder.body(body)?).await?;
        read_json(response).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        self.send_as(&self.tenant, method, uri, body).await
    }
}

pub async fn read_json(response: Response) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

/// Decimal fields serialize as JSON numbers.
pub fn number(value: &Value, field: &str) -> f64 {
    value[field]
        .as_f64()
        .unwrap_or_else(|| panic!("{field} is not a number in {value}"))
}
