//! # Financial Entry Model
//!
//! Payables and receivables share one table, discriminated by `kind`. An entry
//! created with several installments produces one row per installment sharing
//! `installment_group_id`.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[sea_orm(string_value = "payable")]
    Payable,
    #[sea_orm(string_value = "receivable")]
    Receivable,
}

impl EntryKind {
    /// Human label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Payable => "Payable",
            EntryKind::Receivable => "Receivable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    pub kind: EntryKind,

    pub description: String,

    /// Face value in cents
    pub amount_cents: i64,

    pub due_date: NaiveDate,

    pub contact_id: Option<Uuid>,

    pub category_id: Option<Uuid>,

    /// Account the entry is expected to settle against
    pub bank_account_id: Option<Uuid>,

    pub notes: Option<String>,

    /// 1-based position inside the installment group
    pub installment_number: i32,

    pub installment_total: i32,

    pub installment_group_id: Option<Uuid>,

    /// Rule this entry was materialised from, if any
    pub recurring_rule_id: Option<Uuid>,

    pub is_paid: bool,

    pub paid_date: Option<NaiveDate>,

    /// amount + interest - discount, as moved on the bank account
    pub paid_amount_cents: Option<i64>,

    pub interest_cents: i64,

    pub discount_cents: i64,

    /// Account actually debited/credited at settlement
    pub paid_bank_account_id: Option<Uuid>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
