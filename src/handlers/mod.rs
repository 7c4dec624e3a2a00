//! # API Handlers
//!
//! Thin per-resource handlers. Request DTOs are validated into repository
//! inputs before anything is written; every call carries the caller's
//! [`TenantContext`].

use axum::response::Json;
use serde::{Deserialize, Deserializer};

use crate::auth::TenantContext;
use crate::error::{ApiError, validation};
use crate::models::ServiceInfo;

pub mod analytics;
pub mod banks;
pub mod categories;
pub mod contacts;
pub mod entries;
pub mod mercadolivre;
pub mod products;
pub mod recurring;
pub mod storage;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Returns the tenant context resolved from the bearer token
#[utoipa::path(
    get,
    path = "/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Resolved caller", body = TenantContext),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "User without company", body = ApiError)
    ),
    tag = "root"
)]
pub async fn me(tenant: TenantContext) -> Json<TenantContext> {
    Json(tenant)
}

/// Trimmed, non-empty `value` or a 400 naming `field`.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Blank optional strings are stored as `NULL`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies. Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        contact_id: Option<Option<u32>>,
    }

    #[test]
    fn blank_text_is_rejected_or_dropped() {
        assert!(required_text("name", "   ").is_err());
        assert_eq!(required_text("name", " Acme ").unwrap(), "Acme");
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" x ".into())), Some("x".into()));
    }

    #[test]
    fn nullable_separates_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.contact_id, None);
        let cleared: Patch = serde_json::from_str(r#"{"contact_id": null}"#).unwrap();
        assert_eq!(cleared.contact_id, Some(None));
        let set: Patch = serde_json::from_str(r#"{"contact_id": 7}"#).unwrap();
        assert_eq!(set.contact_id, Some(Some(7)));
    }
}
