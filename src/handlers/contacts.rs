//! Customers and suppliers.

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

use super::{optional_text, required_text};
use crate::auth::TenantContext;
use crate::error::{ApiError, validation};
use crate::models::contact::{self, ContactKind};
use crate::repositories::ContactRepository;
use crate::repositories::contact::ContactInput;
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ContactListQuery {
    /// `customer` or `supplier` also match contacts of kind `both`
    pub kind: Option<ContactKind>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactRequest {
    pub name: String,
    pub kind: ContactKind,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactRequest {
    fn validate(self) -> Result<ContactInput, ApiError> {
        let email = optional_text(self.email);
        if let Some(email) = &email {
            let Some((local, domain)) = email.split_once('@') else {
                return Err(validation("email is not a valid address"));
            };
            if local.is_empty() || !domain.contains('.') {
                return Err(validation("email is not a valid address"));
            }
        }
        Ok(ContactInput {
            name: required_text("name", &self.name)?,
            kind: self.kind,
            document: optional_text(self.document),
            email,
            phone: optional_text(self.phone),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub kind: ContactKind,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<contact::Model> for ContactResponse {
    fn from(model: contact::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            kind: model.kind,
            document: model.document,
            email: model.email,
            phone: model.phone,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn repo(state: &AppState) -> ContactRepository {
    ContactRepository::new(state.db.clone())
}

#[utoipa::path(
    get,
    path = "/contacts",
    security(("bearer_auth" = [])),
    params(ContactListQuery),
    responses(
        (status = 200, description = "Contacts ordered by name", body = [ContactResponse])
    ),
    tag = "contacts"
)]
pub async fn list_contacts(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<ContactListQuery>, QueryRejection>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let Query(query) = query?;
    let contacts = repo(&state).list(tenant.company_id, query.kind).await?;
    Ok(Json(contacts.into_iter().map(ContactResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/contacts",
    security(("bearer_auth" = [])),
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Contact created", body = ContactResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn create_contact(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let contact = repo(&state).create(tenant.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[utoipa::path(
    get,
    path = "/contacts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Contact id")),
    responses(
        (status = 200, description = "Contact", body = ContactResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn get_contact(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = repo(&state).get(tenant.company_id, id).await?;
    Ok(Json(contact.into()))
}

#[utoipa::path(
    put,
    path = "/contacts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Contact id")),
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Contact replaced", body = ContactResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn update_contact(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let contact = repo(&state).update(tenant.company_id, id, input).await?;
    Ok(Json(contact.into()))
}

#[utoipa::path(
    delete,
    path = "/contacts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Contact id")),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 400, description = "Still referenced", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn delete_contact(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(tenant.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
