//! Recurring rules and caller-triggered materialisation.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::entries::EntryResponse;
use super::required_text;
use crate::auth::TenantContext;
use crate::error::{ApiError, validation};
use crate::models::financial_entry::EntryKind;
use crate::models::recurring_rule::{self, Frequency};
use crate::money::{from_cents, positive_cents};
use crate::repositories::RecurringRuleRepository;
use crate::repositories::recurring_rule::RuleInput;
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RuleRequest {
    pub kind: EntryKind,
    pub description: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub contact_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub bank_account_id: Option<Uuid>,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl RuleRequest {
    fn validate(self) -> Result<RuleInput, ApiError> {
        if self.end_date.is_some_and(|end| end < self.start_date) {
            return Err(validation("end_date must not be before start_date"));
        }
        Ok(RuleInput {
            kind: self.kind,
            description: required_text("description", &self.description)?,
            amount_cents: positive_cents("amount", self.amount)?,
            frequency: self.frequency,
            start_date: self.start_date,
            end_date: self.end_date,
            contact_id: self.contact_id,
            category_id: self.category_id,
            bank_account_id: self.bank_account_id,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Last due date to materialise, inclusive
    pub until: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RuleResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub kind: EntryKind,
    pub description: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub contact_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub bank_account_id: Option<Uuid>,
    pub is_active: bool,
    pub last_generated_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<recurring_rule::Model> for RuleResponse {
    fn from(model: recurring_rule::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            description: model.description,
            amount: from_cents(model.amount_cents),
            frequency: model.frequency,
            start_date: model.start_date,
            end_date: model.end_date,
            contact_id: model.contact_id,
            category_id: model.category_id,
            bank_account_id: model.bank_account_id,
            is_active: model.is_active,
            last_generated_date: model.last_generated_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub rule: RuleResponse,
    pub generated: Vec<EntryResponse>,
}

fn repo(state: &AppState) -> RecurringRuleRepository {
    RecurringRuleRepository::new(state.db.clone())
}

#[utoipa::path(
    get,
    path = "/recurring",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recurring rules", body = [RuleResponse])
    ),
    tag = "recurring"
)]
pub async fn list_rules(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<RuleResponse>>, ApiError> {
    let rules = repo(&state).list(tenant.company_id).await?;
    Ok(Json(rules.into_iter().map(RuleResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/recurring",
    security(("bearer_auth" = [])),
    request_body = RuleRequest,
    responses(
        (status = 201, description = "Rule created", body = RuleResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "recurring"
)]
pub async fn create_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<RuleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RuleResponse>), ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let rule = repo(&state).create(tenant.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(rule.into())))
}

#[utoipa::path(
    get,
    path = "/recurring/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule", body = RuleResponse),
        (status = 403, description = "Belongs to another company", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "recurring"
)]
pub async fn get_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleResponse>, ApiError> {
    let rule = repo(&state).get(tenant.company_id, id).await?;
    Ok(Json(rule.into()))
}

#[utoipa::path(
    put,
    path = "/recurring/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Rule id")),
    request_body = RuleRequest,
    responses(
        (status = 200, description = "Rule replaced", body = RuleResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "recurring"
)]
pub async fn update_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<RuleRequest>, JsonRejection>,
) -> Result<Json<RuleResponse>, ApiError> {
    let Json(body) = payload?;
    let input = body.validate()?;
    let rule = repo(&state).update(tenant.company_id, id, input).await?;
    Ok(Json(rule.into()))
}

#[utoipa::path(
    delete,
    path = "/recurring/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Rule id")),
    responses(
        (status = 204, description = "Rule deleted; generated entries remain"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "recurring"
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(tenant.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/recurring/{id}/generate",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Rule id")),
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Occurrences materialised", body = GenerateResponse),
        (status = 400, description = "Rule inactive", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "recurring"
)]
pub async fn generate_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = payload?;
    let today = state.today();
    let generated = repo(&state)
        .generate(tenant.company_id, id, body.until)
        .await?;
    Ok(Json(GenerateResponse {
        rule: generated.rule.into(),
        generated: generated
            .entries
            .into_iter()
            .map(|entry| EntryResponse::new(entry, today))
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_before_start_is_rejected() {
        let body: RuleRequest = serde_json::from_str(
            r#"{
                "kind": "payable",
                "description": "Internet",
                "amount": 99.9,
                "frequency": "monthly",
                "start_date": "2025-03-01",
                "end_date": "2025-02-01"
            }"#,
        )
        .unwrap();
        assert!(body.is_active);
        assert!(body.validate().is_err());
    }
}
