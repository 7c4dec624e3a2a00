//! # Payables and Receivables
//!
//! Both resources share one table and one set of request types; the route
//! decides the [`EntryKind`]. Settlement is `pay` for payables and `receive`
//! for receivables.

use axum::{
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::banks::BankResponse;
use super::{nullable, optional_text, required_text};
use crate::auth::TenantContext;
use crate::error::{ApiError, validation};
use crate::models::financial_entry::{self, EntryKind};
use crate::money::{from_cents, non_negative_cents, positive_cents};
use crate::repositories::FinancialEntryRepository;
use crate::repositories::financial_entry::{
    EntryFilter, EntryPatch, EntryStatus, MAX_INSTALLMENTS, NewEntry, Settlement,
    SettlementOutcome,
};
use crate::server::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Open,
    Paid,
    Overdue,
}

impl From<EntryState> for EntryStatus {
    fn from(state: EntryState) -> Self {
        match state {
            EntryState::Open => EntryStatus::Open,
            EntryState::Paid => EntryStatus::Paid,
            EntryState::Overdue => EntryStatus::Overdue,
        }
    }
}

impl EntryState {
    fn of(entry: &financial_entry::Model, today: NaiveDate) -> Self {
        if entry.is_paid {
            EntryState::Paid
        } else if entry.due_date < today {
            EntryState::Overdue
        } else {
            EntryState::Open
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EntryListQuery {
    pub status: Option<EntryState>,
    /// Inclusive lower bound on the due date
    pub due_from: Option<NaiveDate>,
    /// Inclusive upper bound on the due date
    pub due_to: Option<NaiveDate>,
    pub contact_id: Option<Uuid>,
}

impl EntryListQuery {
    fn into_filter(self) -> Result<EntryFilter, ApiError> {
        if let (Some(from), Some(to)) = (self.due_from, self.due_to) {
            if from > to {
                return Err(validation("due_from must not be after due_to"));
            }
        }
        Ok(EntryFilter {
            status: self.status.map(EntryStatus::from),
            due_from: self.due_from,
            due_to: self.due_to,
            contact_id: self.contact_id,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEntryRequest {
    pub description: String,
    /// Total amount; split across installments
    pub amount: Decimal,
    /// Due date of the first installment
    pub due_date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub contact_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub bank_account_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Number of monthly installments, 1 to 120
    #[serde(default = "one")]
    pub installments: u32,
}

fn one() -> u32 {
    1
}

impl CreateEntryRequest {
    fn validate(self) -> Result<NewEntry, ApiError> {
        if self.installments == 0 || self.installments > MAX_INSTALLMENTS {
            return Err(validation(format!(
                "installments must be between 1 and {MAX_INSTALLMENTS}"
            )));
        }
        Ok(NewEntry {
            description: required_text("description", &self.description)?,
            amount_cents: positive_cents("amount", self.amount)?,
            due_date: self.due_date,
            contact_id: self.contact_id,
            category_id: self.category_id,
            bank_account_id: self.bank_account_id,
            notes: optional_text(self.notes),
            installments: self.installments,
        })
    }
}

/// Partial update of an unpaid entry. `null` clears a link.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEntryRequest {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub contact_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub bank_account_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

impl UpdateEntryRequest {
    fn validate(self) -> Result<EntryPatch, ApiError> {
        Ok(EntryPatch {
            description: self
                .description
                .map(|d| required_text("description", &d))
                .transpose()?,
            amount_cents: self
                .amount
                .map(|a| positive_cents("amount", a))
                .transpose()?,
            due_date: self.due_date,
            contact_id: self.contact_id,
            category_id: self.category_id,
            bank_account_id: self.bank_account_id,
            notes: self.notes.map(optional_text),
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SettleRequest {
    /// Defaults to the entry's own bank account
    #[schema(value_type = Option<String>)]
    pub bank_account_id: Option<Uuid>,
    /// Defaults to today in the merchant's offset
    pub paid_date: Option<NaiveDate>,
    pub interest: Option<Decimal>,
    pub discount: Option<Decimal>,
}

impl SettleRequest {
    /// An empty body settles with every default.
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| validation(format!("Invalid JSON: {e}")))
    }

    fn validate(self, today: NaiveDate) -> Result<Settlement, ApiError> {
        Ok(Settlement {
            bank_account_id: self.bank_account_id,
            paid_date: self.paid_date.unwrap_or(today),
            interest_cents: non_negative_cents("interest", self.interest)?,
            discount_cents: non_negative_cents("discount", self.discount)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntryResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub kind: EntryKind,
    pub status: EntryState,
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub contact_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub bank_account_id: Option<Uuid>,
    pub notes: Option<String>,
    pub installment_number: i32,
    pub installment_total: i32,
    #[schema(value_type = Option<String>)]
    pub installment_group_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub recurring_rule_id: Option<Uuid>,
    pub is_paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub paid_amount: Option<Decimal>,
    pub interest: Decimal,
    pub discount: Decimal,
    #[schema(value_type = Option<String>)]
    pub paid_bank_account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryResponse {
    pub fn new(model: financial_entry::Model, today: NaiveDate) -> Self {
        Self {
            status: EntryState::of(&model, today),
            id: model.id,
            kind: model.kind,
            description: model.description,
            amount: from_cents(model.amount_cents),
            due_date: model.due_date,
            contact_id: model.contact_id,
            category_id: model.category_id,
            bank_account_id: model.bank_account_id,
            notes: model.notes,
            installment_number: model.installment_number,
            installment_total: model.installment_total,
            installment_group_id: model.installment_group_id,
            recurring_rule_id: model.recurring_rule_id,
            is_paid: model.is_paid,
            paid_date: model.paid_date,
            paid_amount: model.paid_amount_cents.map(from_cents),
            interest: from_cents(model.interest_cents),
            discount: from_cents(model.discount_cents),
            paid_bank_account_id: model.paid_bank_account_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Entry after settlement or reversal plus the moved bank account.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementResponse {
    pub entry: EntryResponse,
    pub bank_account: Option<BankResponse>,
}

impl SettlementResponse {
    fn new(outcome: SettlementOutcome, today: NaiveDate) -> Self {
        Self {
            entry: EntryResponse::new(outcome.entry, today),
            bank_account: outcome.bank_account.map(BankResponse::from),
        }
    }
}

fn repo(state: &AppState) -> FinancialEntryRepository {
    FinancialEntryRepository::new(state.db.clone())
}

async fn list_entries(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    query: Result<Query<EntryListQuery>, QueryRejection>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let today = state.today();
    let entries = repo(state)
        .list(tenant.company_id, kind, filter, today)
        .await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|entry| EntryResponse::new(entry, today))
            .collect(),
    ))
}

async fn create_entry(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    payload: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<EntryResponse>>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let today = state.today();
    let created = repo(state).create(tenant.company_id, kind, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(
            created
                .into_iter()
                .map(|entry| EntryResponse::new(entry, today))
                .collect(),
        ),
    ))
}

async fn get_entry(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    id: Uuid,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = repo(state).get(tenant.company_id, kind, id).await?;
    Ok(Json(EntryResponse::new(entry, state.today())))
}

async fn update_entry(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    id: Uuid,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    let Json(body) = payload?;
    let patch = body.validate()?;
    let entry = repo(state)
        .update(tenant.company_id, kind, id, patch)
        .await?;
    Ok(Json(EntryResponse::new(entry, state.today())))
}

async fn delete_entry(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    id: Uuid,
) -> Result<StatusCode, ApiError> {
    repo(state).delete(tenant.company_id, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn settle_entry(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    id: Uuid,
    body: Bytes,
) -> Result<Json<SettlementResponse>, ApiError> {
    let body = SettleRequest::parse(&body)?;
    let today = state.today();
    let settlement = body.validate(today)?;
    let outcome = repo(state)
        .settle(tenant.company_id, kind, id, settlement)
        .await?;
    Ok(Json(SettlementResponse::new(outcome, today)))
}

async fn reverse_entry(
    state: &AppState,
    tenant: TenantContext,
    kind: EntryKind,
    id: Uuid,
) -> Result<Json<SettlementResponse>, ApiError> {
    let outcome = repo(state).reverse(tenant.company_id, kind, id).await?;
    Ok(Json(SettlementResponse::new(outcome, state.today())))
}

#[utoipa::path(
    get,
    path = "/payables",
    security(("bearer_auth" = [])),
    params(EntryListQuery),
    responses(
        (status = 200, description = "Payables ordered by due date", body = [EntryResponse]),
        (status = 400, description = "Invalid filter", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn list_payables(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<EntryListQuery>, QueryRejection>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    list_entries(&state, tenant, EntryKind::Payable, query).await
}

#[utoipa::path(
    post,
    path = "/payables",
    security(("bearer_auth" = [])),
    request_body = CreateEntryRequest,
    responses(
        (status = 201, description = "One payable per installment", body = [EntryResponse]),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Referenced row belongs to another company", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn create_payable(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<EntryResponse>>), ApiError> {
    create_entry(&state, tenant, EntryKind::Payable, payload).await
}

#[utoipa::path(
    get,
    path = "/payables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Payable id")),
    responses(
        (status = 200, description = "Payable", body = EntryResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn get_payable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryResponse>, ApiError> {
    get_entry(&state, tenant, EntryKind::Payable, id).await
}

#[utoipa::path(
    patch,
    path = "/payables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Payable id")),
    request_body = UpdateEntryRequest,
    responses(
        (status = 200, description = "Payable updated", body = EntryResponse),
        (status = 400, description = "Validation error or already paid", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn update_payable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    update_entry(&state, tenant, EntryKind::Payable, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/payables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Payable id")),
    responses(
        (status = 204, description = "Payable deleted"),
        (status = 400, description = "Already paid", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn delete_payable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    delete_entry(&state, tenant, EntryKind::Payable, id).await
}

#[utoipa::path(
    post,
    path = "/payables/{id}/pay",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Payable id")),
    request_body = SettleRequest,
    responses(
        (status = 200, description = "Payable paid", body = SettlementResponse),
        (status = 400, description = "Already paid or insufficient balance", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn pay_payable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<SettlementResponse>, ApiError> {
    settle_entry(&state, tenant, EntryKind::Payable, id, body).await
}

#[utoipa::path(
    post,
    path = "/payables/{id}/reverse",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Payable id")),
    responses(
        (status = 200, description = "Payment reversed", body = SettlementResponse),
        (status = 400, description = "Not paid", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payables"
)]
pub async fn reverse_payable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementResponse>, ApiError> {
    reverse_entry(&state, tenant, EntryKind::Payable, id).await
}

#[utoipa::path(
    get,
    path = "/receivables",
    security(("bearer_auth" = [])),
    params(EntryListQuery),
    responses(
        (status = 200, description = "Receivables ordered by due date", body = [EntryResponse]),
        (status = 400, description = "Invalid filter", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn list_receivables(
    State(state): State<AppState>,
    tenant: TenantContext,
    query: Result<Query<EntryListQuery>, QueryRejection>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    list_entries(&state, tenant, EntryKind::Receivable, query).await
}

#[utoipa::path(
    post,
    path = "/receivables",
    security(("bearer_auth" = [])),
    request_body = CreateEntryRequest,
    responses(
        (status = 201, description = "One receivable per installment", body = [EntryResponse]),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Referenced row belongs to another company", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn create_receivable(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<EntryResponse>>), ApiError> {
    create_entry(&state, tenant, EntryKind::Receivable, payload).await
}

#[utoipa::path(
    get,
    path = "/receivables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Receivable id")),
    responses(
        (status = 200, description = "Receivable", body = EntryResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn get_receivable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryResponse>, ApiError> {
    get_entry(&state, tenant, EntryKind::Receivable, id).await
}

#[utoipa::path(
    patch,
    path = "/receivables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Receivable id")),
    request_body = UpdateEntryRequest,
    responses(
        (status = 200, description = "Receivable updated", body = EntryResponse),
        (status = 400, description = "Validation error or already received", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn update_receivable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    update_entry(&state, tenant, EntryKind::Receivable, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/receivables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Receivable id")),
    responses(
        (status = 204, description = "Receivable deleted"),
        (status = 400, description = "Already received", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn delete_receivable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    delete_entry(&state, tenant, EntryKind::Receivable, id).await
}

#[utoipa::path(
    post,
    path = "/receivables/{id}/receive",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Receivable id")),
    request_body = SettleRequest,
    responses(
        (status = 200, description = "Receivable received", body = SettlementResponse),
        (status = 400, description = "Already received", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn receive_receivable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<SettlementResponse>, ApiError> {
    settle_entry(&state, tenant, EntryKind::Receivable, id, body).await
}

#[utoipa::path(
    post,
    path = "/receivables/{id}/reverse",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Receivable id")),
    responses(
        (status = 200, description = "Receipt reversed", body = SettlementResponse),
        (status = 400, description = "Not received", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "receivables"
)]
pub async fn reverse_receivable(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementResponse>, ApiError> {
    reverse_entry(&state, tenant, EntryKind::Receivable, id).await
}
