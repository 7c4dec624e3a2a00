//! # Authentication and Tenancy
//!
//! Bearer tokens are HS256 JWTs whose `sub` is a user id. The middleware
//! resolves the user's default company and stores a [`TenantContext`] in the
//! request extensions; handlers take it as an extractor and pass the company
//! id to every repository call.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorType, forbidden, unauthorized};
use crate::models::user;
use crate::server::AppState;

/// Resolved caller identity for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TenantContext {
    pub user_id: Uuid,
    pub company_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Signs a token for `user_id` valid for `ttl`.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            unauthorized(Some("Invalid or expired token"))
        })
}

/// Validates the JWT and attaches the caller's [`TenantContext`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
        tracing::error!("JWT secret is not configured");
        ApiError::from(ErrorType::InternalServerError)
    })?;
    let claims = decode_token(secret, token)?;

    let user = user::Entity::find_by_id(claims.sub)
        .one(&*state.db)
        .await?
        .ok_or_else(|| unauthorized(Some("Unknown user")))?;
    let company_id = user
        .default_company_id
        .ok_or_else(|| forbidden(Some("User is not linked to a company")))?;

    let tenant = TenantContext {
        user_id: user.id,
        company_id,
    };
    tracing::debug!(user_id = %tenant.user_id, company_id = %tenant.company_id, "Authenticated request");
    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::crypto::CryptoKey;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "unit-test-secret";

    fn test_state() -> AppState {
        let config = Arc::new(AppConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..Default::default()
        });
        let key = CryptoKey::new(vec![0u8; 32]).unwrap();
        AppState::new(config, sea_orm::DatabaseConnection::default(), key).unwrap()
    }

    async fn run_middleware(request: Request<Body>) -> Response {
        async fn handler() -> &'static str {
            "OK"
        }
        let state = test_state();
        Router::new()
            .route("/test", get(handler))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
            .oneshot(request)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_auth_header_returns_401() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = run_middleware(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_auth_scheme_returns_401() {
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic dGVzdDoxMjM=")
            .body(Body::empty())
            .unwrap();
        let response = run_middleware(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_returns_401() {
        let token = issue_token("another-secret", Uuid::new_v4(), Duration::hours(1)).unwrap();
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = run_middleware(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn issued_token_decodes_to_subject() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, user_id, Duration::hours(1)).unwrap();
        let claims = decode_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), Duration::hours(-2)).unwrap();
        let err = decode_token(SECRET, &token).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
