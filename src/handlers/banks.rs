//! Bank account endpoints and balance history.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{optional_text, required_text};
use crate::auth::TenantContext;
use crate::error::ApiError;
use crate::models::bank_account;
use crate::models::bank_transaction::{self, BankTransactionKind};
use crate::money::{from_cents, non_negative_cents, signed_cents};
use crate::repositories::BankAccountRepository;
use crate::repositories::bank_account::{BankAccountPatch, NewBankAccount};
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBankRequest {
    pub name: String,
    pub bank_code: Option<String>,
    pub agency: Option<String>,
    pub account_number: Option<String>,
    /// Opening balance; may be negative
    #[serde(default)]
    pub initial_balance: Decimal,
    pub overdraft_limit: Option<Decimal>,
}

impl CreateBankRequest {
    fn validate(self) -> Result<NewBankAccount, ApiError> {
        Ok(NewBankAccount {
            name: required_text("name", &self.name)?,
            bank_code: optional_text(self.bank_code),
            agency: optional_text(self.agency),
            account_number: optional_text(self.account_number),
            initial_balance_cents: signed_cents("initial_balance", self.initial_balance)?,
            overdraft_limit_cents: non_negative_cents("overdraft_limit", self.overdraft_limit)?,
        })
    }
}

/// Metadata and overdraft only; balances move through settlements.
/// An empty string clears an optional field.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBankRequest {
    pub name: Option<String>,
    pub bank_code: Option<String>,
    pub agency: Option<String>,
    pub account_number: Option<String>,
    pub overdraft_limit: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl UpdateBankRequest {
    fn validate(self) -> Result<BankAccountPatch, ApiError> {
        Ok(BankAccountPatch {
            name: self
                .name
                .map(|name| required_text("name", &name))
                .transpose()?,
            bank_code: self.bank_code.map(|v| optional_text(Some(v))),
            agency: self.agency.map(|v| optional_text(Some(v))),
            account_number: self.account_number.map(|v| optional_text(Some(v))),
            overdraft_limit_cents: self
                .overdraft_limit
                .map(|limit| non_negative_cents("overdraft_limit", Some(limit)))
                .transpose()?,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub bank_code: Option<String>,
    pub agency: Option<String>,
    pub account_number: Option<String>,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub overdraft_limit: Decimal,
    /// Current balance plus overdraft limit
    pub available_balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<bank_account::Model> for BankResponse {
    fn from(model: bank_account::Model) -> Self {
        Self {
            available_balance: from_cents(model.available_cents()),
            id: model.id,
            name: model.name,
            bank_code: model.bank_code,
            agency: model.agency,
            account_number: model.account_number,
            initial_balance: from_cents(model.initial_balance_cents),
            current_balance: from_cents(model.current_balance_cents),
            overdraft_limit: from_cents(model.overdraft_limit_cents),
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankTransactionResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub kind: BankTransactionKind,
    /// Signed: credits positive, debits negative
    pub amount: Decimal,
    pub balance_after: Decimal,
    #[schema(value_type = Option<String>)]
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<bank_transaction::Model> for BankTransactionResponse {
    fn from(model: bank_transaction::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            amount: from_cents(model.amount_cents),
            balance_after: from_cents(model.balance_after_cents),
            reference_id: model.reference_id,
            description: model.description,
            created_at: model.created_at,
        }
    }
}

fn repo(state: &AppState) -> BankAccountRepository {
    BankAccountRepository::new(state.db.clone())
}

#[utoipa::path(
    get,
    path = "/banks",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bank accounts of the company", body = [BankResponse]),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "banks"
)]
pub async fn list_banks(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<BankResponse>>, ApiError> {
    let accounts = repo(&state).list(tenant.company_id).await?;
    Ok(Json(accounts.into_iter().map(BankResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/banks",
    security(("bearer_auth" = [])),
    request_body = CreateBankRequest,
    responses(
        (status = 201, description = "Bank account created", body = BankResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "banks"
)]
pub async fn create_bank(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<CreateBankRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BankResponse>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let account = repo(&state).create(tenant.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

#[utoipa::path(
    get,
    path = "/banks/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Bank account id")),
    responses(
        (status = 200, description = "Bank account", body = BankResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "banks"
)]
pub async fn get_bank(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<BankResponse>, ApiError> {
    let account = repo(&state).get(tenant.company_id, id).await?;
    Ok(Json(account.into()))
}

#[utoipa::path(
    patch,
    path = "/banks/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Bank account id")),
    request_body = UpdateBankRequest,
    responses(
        (status = 200, description = "Bank account updated", body = BankResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "banks"
)]
pub async fn update_bank(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateBankRequest>, JsonRejection>,
) -> Result<Json<BankResponse>, ApiError> {
    let Json(body) = payload?;
    let patch = body.validate()?;
    let account = repo(&state).update(tenant.company_id, id, patch).await?;
    Ok(Json(account.into()))
}

#[utoipa::path(
    delete,
    path = "/banks/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Bank account id")),
    responses(
        (status = 204, description = "Bank account deleted"),
        (status = 400, description = "Referenced by entries or rules", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "banks"
)]
pub async fn delete_bank(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(tenant.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/banks/{id}/history",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Bank account id")),
    responses(
        (status = 200, description = "Balance movements, newest first", body = [BankTransactionResponse]),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "banks"
)]
pub async fn bank_history(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BankTransactionResponse>>, ApiError> {
    let movements = repo(&state).history(tenant.company_id, id).await?;
    Ok(Json(
        movements
            .into_iter()
            .map(BankTransactionResponse::from)
            .collect(),
    ))
}
