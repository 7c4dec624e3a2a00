//! # Product Handlers
//!
//! Catalogue CRUD, kit composition and image upload. Deletion is soft and
//! frees the SKU; see [`ProductRepository::delete`].

use axum::{
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::required_text;
use crate::auth::TenantContext;
use crate::error::{ApiError, rejected, validation};
use crate::models::product::ProductKind;
use crate::money::{from_cents, non_negative_cents};
use crate::repositories::ProductRepository;
use crate::repositories::product::{ComponentInput, ProductInput, ProductWithComponents};
use crate::server::AppState;
use crate::storage::{image_extension, product_image_key, public_url};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComponentRequest {
    pub sku: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default = "simple")]
    pub kind: ProductKind,
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub sale_price: Decimal,
    #[serde(default)]
    pub stock: i32,
    /// Required for kits; must be empty for simple products
    #[serde(default)]
    pub components: Vec<ComponentRequest>,
}

fn simple() -> ProductKind {
    ProductKind::Simple
}

impl ProductRequest {
    fn validate(self) -> Result<ProductInput, ApiError> {
        let cost_price_cents = self
            .cost_price
            .map(|cost| non_negative_cents("cost_price", Some(cost)))
            .transpose()?;
        Ok(ProductInput {
            sku: required_text("sku", &self.sku)?,
            name: required_text("name", &self.name)?,
            kind: self.kind,
            cost_price_cents,
            sale_price_cents: non_negative_cents("sale_price", Some(self.sale_price))?,
            stock: self.stock,
            components: self
                .components
                .into_iter()
                .map(|c| {
                    Ok(ComponentInput {
                        component_sku: required_text("components.sku", &c.sku)?,
                        quantity: c.quantity,
                    })
                })
                .collect::<Result<_, ApiError>>()?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentResponse {
    pub sku: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub cost_price: Option<Decimal>,
    pub sale_price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    pub components: Vec<ComponentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductWithComponents> for ProductResponse {
    fn from(value: ProductWithComponents) -> Self {
        let ProductWithComponents {
            product,
            components,
        } = value;
        Self {
            id: product.id,
            sku: product.sku,
            name: product.name,
            kind: product.kind,
            cost_price: product.cost_price_cents.map(from_cents),
            sale_price: from_cents(product.sale_price_cents),
            stock: product.stock,
            image_url: product.image_path.as_deref().map(public_url),
            components: components
                .into_iter()
                .map(|c| ComponentResponse {
                    sku: c.component_sku,
                    quantity: c.quantity,
                })
                .collect(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUploadResponse {
    pub key: String,
    /// Path-based reference; not signed and does not expire
    pub url: String,
}

fn repo(state: &AppState) -> ProductRepository {
    ProductRepository::new(state.db.clone())
}

#[utoipa::path(
    get,
    path = "/products",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Live products ordered by SKU", body = [ProductResponse])
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = repo(&state).list(tenant.company_id).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/products",
    security(("bearer_auth" = [])),
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "SKU already in use", body = ApiError)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let product = repo(&state).create(tenant.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found or deleted", body = ApiError)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = repo(&state).get(tenant.company_id, id).await?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    put,
    path = "/products/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product replaced", body = ProductResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Not found", body = ApiError),
        (status = 409, description = "SKU already in use", body = ApiError)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let product = repo(&state).update(tenant.company_id, id, input).await?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product soft-deleted; SKU is free again"),
        (status = 400, description = "Has stock or is a kit component", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(tenant.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stores the raw request body as the product image.
#[utoipa::path(
    put,
    path = "/products/{id}/image",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Product id")),
    request_body(content = Vec<u8>, content_type = "image/png", description = "PNG, JPEG, WebP or GIF bytes"),
    responses(
        (status = 200, description = "Image stored", body = ImageUploadResponse),
        (status = 400, description = "Empty body or unsupported content type", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "products"
)]
pub async fn upload_product_image(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let extension = image_extension(content_type).ok_or_else(|| {
        rejected(
            "unsupported_media_type",
            format!("unsupported image content type '{content_type}'"),
        )
    })?;
    if body.is_empty() {
        return Err(validation("image body is empty"));
    }

    let repo = repo(&state);
    let existing = repo.get(tenant.company_id, id).await?;
    let key = product_image_key(tenant.company_id, existing.product.id, extension);
    state.objects.put(&key, &body).await?;
    repo.set_image(tenant.company_id, id, key.clone()).await?;

    if let Some(previous) = existing.product.image_path {
        if let Err(e) = state.objects.delete(&previous).await {
            tracing::warn!(key = %previous, error = %e, "Failed to remove replaced product image");
        }
    }

    tracing::info!(company_id = %tenant.company_id, product_id = %id, key = %key, "Product image stored");
    Ok(Json(ImageUploadResponse {
        url: public_url(&key),
        key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_simple_product() {
        let body: ProductRequest =
            serde_json::from_str(r#"{"sku": "CAM-01", "name": "Camiseta", "sale_price": 49.9}"#)
                .unwrap();
        let input = body.validate().unwrap();
        assert_eq!(input.kind, ProductKind::Simple);
        assert_eq!(input.sale_price_cents, 4990);
        assert_eq!(input.cost_price_cents, None);
        assert!(input.components.is_empty());
    }

    #[test]
    fn negative_cost_is_rejected() {
        let body: ProductRequest = serde_json::from_str(
            r#"{"sku": "CAM-01", "name": "Camiseta", "cost_price": -1}"#,
        )
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn kit_components_carry_through() {
        let body: ProductRequest = serde_json::from_str(
            r#"{
                "sku": "KIT-01",
                "name": "Kit",
                "kind": "kit",
                "components": [{"sku": "A", "quantity": 1}, {"sku": "B", "quantity": 2}]
            }"#,
        )
        .unwrap();
        let input = body.validate().unwrap();
        assert_eq!(
            input.components,
            vec![
                ComponentInput {
                    component_sku: "A".into(),
                    quantity: 1
                },
                ComponentInput {
                    component_sku: "B".into(),
                    quantity: 2
                },
            ]
        );
    }
}
