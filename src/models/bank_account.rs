//! # Bank Account Model
//!
//! Balances are kept in cents. `current_balance_cents` is mutated by payable
//! payments, receivable receipts and their reversals; every mutation is
//! mirrored by a row in `bank_transactions`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning company
    pub company_id: Uuid,

    /// Display name (e.g. "Itaú PJ")
    pub name: String,

    /// Febraban bank code
    pub bank_code: Option<String>,

    pub agency: Option<String>,

    pub account_number: Option<String>,

    /// Opening balance, fixed at creation
    pub initial_balance_cents: i64,

    /// Running balance
    pub current_balance_cents: i64,

    /// How far below zero a payment may take the balance
    pub overdraft_limit_cents: i64,

    pub is_active: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bank_transaction::Entity")]
    Transactions,
}

impl Related<super::bank_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Funds a debit may consume: balance plus overdraft.
    pub fn available_cents(&self) -> i64 {
        self.current_balance_cents
            .saturating_add(self.overdraft_limit_cents)
    }
}
