//! Serves stored objects inside the caller's company prefix.

use axum::{
    extract::{Path, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::auth::TenantContext;
use crate::error::{ApiError, forbidden, not_found};
use crate::server::AppState;
use crate::storage::{belongs_to, validate_key};

#[utoipa::path(
    get,
    path = "/storage/{key}",
    security(("bearer_auth" = [])),
    params(("key" = String, Path, description = "Object key, e.g. companies/<id>/products/<id>/<file>")),
    responses(
        (status = 200, description = "Object bytes", content_type = "application/octet-stream"),
        (status = 400, description = "Malformed key", body = ApiError),
        (status = 403, description = "Key outside the caller's company", body = ApiError),
        (status = 404, description = "No such object", body = ApiError)
    ),
    tag = "storage"
)]
pub async fn get_object(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    validate_key(&key)?;
    if !belongs_to(&key, tenant.company_id) {
        return Err(forbidden(Some("Object belongs to another company")));
    }
    let object = state
        .objects
        .get(&key)
        .await?
        .ok_or_else(|| not_found("Object"))?;
    Ok((
        [
            (CONTENT_TYPE, object.content_type),
            (CACHE_CONTROL, "private, max-age=300"),
        ],
        object.bytes,
    )
        .into_response())
}
