//! Append-only bank account history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum BankTransactionKind {
    #[sea_orm(string_value = "payable_payment")]
    PayablePayment,
    #[sea_orm(string_value = "payable_reversal")]
    PayableReversal,
    #[sea_orm(string_value = "receivable_receipt")]
    ReceivableReceipt,
    #[sea_orm(string_value = "receivable_reversal")]
    ReceivableReversal,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub bank_account_id: Uuid,
    pub kind: BankTransactionKind,
    /// Signed: debits are negative
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    /// Payable/receivable that caused the movement
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bank_account::Entity",
        from = "Column::BankAccountId",
        to = "super::bank_account::Column::Id",
        on_delete = "Cascade"
    )]
    BankAccount,
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
