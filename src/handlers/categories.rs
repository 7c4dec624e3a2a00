//! Income and expense categories.

use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::required_text;
use crate::auth::TenantContext;
use crate::error::ApiError;
use crate::models::category::{self, CategoryKind};
use crate::repositories::CategoryRepository;
use crate::repositories::category::CategoryInput;
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CategoryListQuery {
    pub kind: Option<CategoryKind>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    pub kind: CategoryKind,
    /// Parent in the same company with the same kind
    #[schema(value_type = Option<String>)]
    pub parent_id: Option<Uuid>,
}

impl CategoryRequest {
    fn validate(self) -> Result<CategoryInput, ApiError> {
        Ok(CategoryInput {
            name: required_text("name", &self.name)?,
            kind: self.kind,
            parent_id: self.parent_id,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    #[schema(value_type = Option<String>)]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            kind: model.kind,
            parent_id: model.parent_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn repo(state: &AppState) -> CategoryRepository {
    CategoryRepository::new(state.db.clone())
}

#[utoipa::path(
    get,
    path = "/categories",
    security(("bearer_auth" = [])),
    params(CategoryListQuery),
    responses(
        (status = 200, description = "Categories ordered by name", body = [CategoryResponse])
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<CategoryListQuery>, QueryRejection>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let Query(query) = query?;
    let categories = repo(&state).list(tenant.company_id, query.kind).await?;
    Ok(Json(
        categories.into_iter().map(CategoryResponse::from).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/categories",
    security(("bearer_auth" = [])),
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Parent belongs to another company", body = ApiError)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let category = repo(&state).create(tenant.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = repo(&state).get(tenant.company_id, id).await?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Category id")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category replaced", body = CategoryResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let category = repo(&state).update(tenant.company_id, id, input).await?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Has subcategories", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(tenant.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
