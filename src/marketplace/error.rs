use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::repositories::RepositoryError;

/// Failure kinds of the Mercado Livre integration. Each maps to a stable
/// `code` string in the error body.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Mercado Livre client credentials are not configured")]
    MissingClientCredentials,

    #[error("Mercado Livre configuration is invalid: {0}")]
    InvalidConfiguration(String),

    #[error("integration {integration_id} expired at {expired_at}; reconnect the store")]
    IntegrationExpired {
        integration_id: Uuid,
        expired_at: DateTime<Utc>,
    },

    #[error("integration {integration_id} has no refresh token; reconnect the store")]
    MissingRefreshToken { integration_id: Uuid },

    #[error("authorization code exchange failed with status {status}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("token refresh failed with status {status}")]
    TokenRefreshFailed { status: u16, body: String },

    #[error("fetching the seller profile failed with status {status}")]
    UserFetchFailed { status: u16, body: String },

    #[error("Mercado Livre returned status {status} for {path}")]
    Upstream {
        status: u16,
        path: String,
        body: String,
    },

    #[error("malformed Mercado Livre response: {0}")]
    MalformedResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Database(#[from] RepositoryError),
}

impl MarketplaceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingClientCredentials => "missing_client_credentials",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::IntegrationExpired { .. } => "integration_expired",
            Self::MissingRefreshToken { .. } => "missing_refresh_token",
            Self::TokenExchangeFailed { .. } => "token_exchange_failed",
            Self::TokenRefreshFailed { .. } => "token_refresh_failed",
            Self::UserFetchFailed { .. } => "user_fetch_failed",
            Self::Upstream { .. } => "upstream_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Network(_) => "network_error",
            Self::Database(_) => "database_error",
        }
    }

    /// Status reported by the marketplace, when the failure came from it.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::TokenExchangeFailed { status, .. }
            | Self::TokenRefreshFailed { status, .. }
            | Self::UserFetchFailed { status, .. }
            | Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingClientCredentials | Self::InvalidConfiguration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::IntegrationExpired { .. } | Self::MissingRefreshToken { .. } => {
                StatusCode::CONFLICT
            }
            Self::TokenExchangeFailed { .. }
            | Self::TokenRefreshFailed { .. }
            | Self::UserFetchFailed { .. }
            | Self::Upstream { .. }
            | Self::MalformedResponse(_)
            | Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MarketplaceError> for ApiError {
    fn from(err: MarketplaceError) -> Self {
        if let MarketplaceError::Database(inner) = err {
            return inner.into();
        }
        let api = ApiError::new(err.status_code(), err.code(), err.to_string());
        match &err {
            MarketplaceError::IntegrationExpired {
                integration_id,
                expired_at,
            } => api.with_details(json!({
                "integration_id": integration_id,
                "expired_at": expired_at,
            })),
            _ => match err.upstream_status() {
                Some(status) => api.with_details(json!({ "upstream_status": status })),
                None => api,
            },
        }
    }
}
