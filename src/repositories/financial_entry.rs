//! # Financial Entry Repository
//!
//! Payables and receivables: installment creation, filtered listing and
//! settlement. Settlement and reversal move the bank balance and write the
//! entry inside a single transaction.

use chrono::{Months, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::bank_account::{self as accounts, Movement};
use super::{RepositoryError, RepositoryResult, owned, referenced};
use crate::models::bank_transaction::BankTransactionKind;
use crate::models::financial_entry::{self, Entity as FinancialEntry, EntryKind};
use crate::models::{bank_account, category, contact};
use crate::money::from_cents;

pub const MAX_INSTALLMENTS: u32 = 120;

/// Validated creation input; amounts in cents.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub description: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub contact_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub notes: Option<String>,
    pub installments: u32,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub contact_id: Option<Option<Uuid>>,
    pub category_id: Option<Option<Uuid>>,
    pub bank_account_id: Option<Option<Uuid>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Unpaid and due today or later
    Open,
    Paid,
    /// Unpaid and past due
    Overdue,
}

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub contact_id: Option<Uuid>,
}

/// Pay/receive request.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Overrides the entry's own bank account
    pub bank_account_id: Option<Uuid>,
    pub paid_date: NaiveDate,
    pub interest_cents: i64,
    pub discount_cents: i64,
}

/// Result of a settlement or reversal.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub entry: financial_entry::Model,
    pub bank_account: Option<bank_account::Model>,
}

/// Splits `total_cents` into `count` parts; the last one absorbs the
/// remainder so the parts always sum to the total.
pub fn split_installments(total_cents: i64, count: u32) -> Vec<i64> {
    let count = i64::from(count.max(1));
    let base = total_cents / count;
    let mut parts = vec![base; count as usize];
    if let Some(last) = parts.last_mut() {
        *last = total_cents - base * (count - 1);
    }
    parts
}

pub struct FinancialEntryRepository {
    db: Arc<DatabaseConnection>,
}

impl FinancialEntryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        kind: EntryKind,
        filter: EntryFilter,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<financial_entry::Model>> {
        let mut query = FinancialEntry::find()
            .filter(financial_entry::Column::CompanyId.eq(company_id))
            .filter(financial_entry::Column::Kind.eq(kind));

        query = match filter.status {
            Some(EntryStatus::Paid) => query.filter(financial_entry::Column::IsPaid.eq(true)),
            Some(EntryStatus::Open) => query
                .filter(financial_entry::Column::IsPaid.eq(false))
                .filter(financial_entry::Column::DueDate.gte(today)),
            Some(EntryStatus::Overdue) => query
                .filter(financial_entry::Column::IsPaid.eq(false))
                .filter(financial_entry::Column::DueDate.lt(today)),
            None => query,
        };
        if let Some(from) = filter.due_from {
            query = query.filter(financial_entry::Column::DueDate.gte(from));
        }
        if let Some(to) = filter.due_to {
            query = query.filter(financial_entry::Column::DueDate.lte(to));
        }
        if let Some(contact_id) = filter.contact_id {
            query = query.filter(financial_entry::Column::ContactId.eq(contact_id));
        }

        Ok(query
            .order_by_asc(financial_entry::Column::DueDate)
            .order_by_asc(financial_entry::Column::InstallmentNumber)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(
        &self,
        company_id: Uuid,
        kind: EntryKind,
        id: Uuid,
    ) -> RepositoryResult<financial_entry::Model> {
        find_owned(&*self.db, company_id, kind, id).await
    }

    /// Creates one row per installment in a single transaction. Installment
    /// `i` is due `i` months after `due_date`.
    pub async fn create(
        &self,
        company_id: Uuid,
        kind: EntryKind,
        input: NewEntry,
    ) -> RepositoryResult<Vec<financial_entry::Model>> {
        if input.installments == 0 || input.installments > MAX_INSTALLMENTS {
            return Err(RepositoryError::Validation(format!(
                "installments must be between 1 and {MAX_INSTALLMENTS}"
            )));
        }
        if i64::from(input.installments) > input.amount_cents {
            return Err(RepositoryError::Validation(
                "amount is too small for the number of installments".to_string(),
            ));
        }
        check_references(
            &*self.db,
            company_id,
            input.contact_id,
            input.category_id,
            input.bank_account_id,
        )
        .await?;

        let parts = split_installments(input.amount_cents, input.installments);
        let total = input.installments as i32;
        let group_id = (input.installments > 1).then(Uuid::new_v4);

        let mut due_dates = Vec::with_capacity(parts.len());
        for offset in 0..input.installments {
            let due = input
                .due_date
                .checked_add_months(Months::new(offset))
                .ok_or_else(|| RepositoryError::Validation("due_date is out of range".to_string()))?;
            due_dates.push(due);
        }

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(parts.len());
        for (index, (amount, due_date)) in parts.into_iter().zip(due_dates).enumerate() {
            let number = index as i32 + 1;
            let description = if total > 1 {
                format!("{} ({number}/{total})", input.description)
            } else {
                input.description.clone()
            };
            let row = new_active(company_id, kind, now)
                .with_description(description)
                .with_amount(amount, due_date)
                .with_links(input.contact_id, input.category_id, input.bank_account_id)
                .with_installment(number, total, group_id)
                .with_notes(input.notes.clone());
            created.push(row.0.insert(&txn).await?);
        }
        txn.commit().await?;

        tracing::info!(
            company_id = %company_id,
            kind = ?kind,
            installments = created.len(),
            "Financial entries created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        kind: EntryKind,
        id: Uuid,
        patch: EntryPatch,
    ) -> RepositoryResult<financial_entry::Model> {
        let existing = find_owned(&*self.db, company_id, kind, id).await?;
        ensure_unpaid(&existing)?;
        check_references(
            &*self.db,
            company_id,
            patch.contact_id.flatten(),
            patch.category_id.flatten(),
            patch.bank_account_id.flatten(),
        )
        .await?;

        let mut active: financial_entry::ActiveModel = existing.into();
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(amount) = patch.amount_cents {
            active.amount_cents = Set(amount);
        }
        if let Some(due_date) = patch.due_date {
            active.due_date = Set(due_date);
        }
        if let Some(contact_id) = patch.contact_id {
            active.contact_id = Set(contact_id);
        }
        if let Some(category_id) = patch.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(bank_account_id) = patch.bank_account_id {
            active.bank_account_id = Set(bank_account_id);
        }
        if let Some(notes) = patch.notes {
            active.notes = Set(notes);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, company_id: Uuid, kind: EntryKind, id: Uuid) -> RepositoryResult<()> {
        let existing = find_owned(&*self.db, company_id, kind, id).await?;
        ensure_unpaid(&existing)?;
        FinancialEntry::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Pays a payable or receives a receivable.
    ///
    /// The settled total is `amount + interest - discount`. A payable debits
    /// the account and is rejected when the total exceeds balance plus
    /// overdraft; a receivable credits it.
    pub async fn settle(
        &self,
        company_id: Uuid,
        kind: EntryKind,
        id: Uuid,
        settlement: Settlement,
    ) -> RepositoryResult<SettlementOutcome> {
        let txn = self.db.begin().await?;

        let entry = find_owned(&txn, company_id, kind, id).await?;
        if entry.is_paid {
            return Err(RepositoryError::rejected(
                "already_paid",
                format!("{} is already paid", kind.label()),
            ));
        }

        let total = settled_total(
            entry.amount_cents,
            settlement.interest_cents,
            settlement.discount_cents,
        )?;

        let account_id = settlement.bank_account_id.or(entry.bank_account_id);
        let account = match account_id {
            Some(account_id) => {
                let account = accounts::find_owned(&txn, company_id, account_id).await?;
                let (movement_kind, delta) = match kind {
                    EntryKind::Payable => {
                        let available = account.available_cents();
                        if total > available {
                            return Err(insufficient_balance(total, available));
                        }
                        (BankTransactionKind::PayablePayment, -total)
                    }
                    EntryKind::Receivable => (BankTransactionKind::ReceivableReceipt, total),
                };
                let movement = Movement {
                    kind: movement_kind,
                    amount_cents: delta,
                    reference_id: Some(entry.id),
                    description: Some(entry.description.clone()),
                };
                Some(accounts::apply_movement(&txn, account, movement).await?)
            }
            None => None,
        };

        let mut active: financial_entry::ActiveModel = entry.into();
        active.is_paid = Set(true);
        active.paid_date = Set(Some(settlement.paid_date));
        active.paid_amount_cents = Set(Some(total));
        active.interest_cents = Set(settlement.interest_cents);
        active.discount_cents = Set(settlement.discount_cents);
        active.paid_bank_account_id = Set(account.as_ref().map(|a| a.id));
        active.updated_at = Set(Utc::now());
        let entry = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            company_id = %company_id,
            entry_id = %entry.id,
            kind = ?kind,
            paid_amount_cents = total,
            "Financial entry settled"
        );
        Ok(SettlementOutcome {
            entry,
            bank_account: account,
        })
    }

    /// Undoes a settlement, restoring the bank balance by the recorded paid
    /// amount.
    pub async fn reverse(
        &self,
        company_id: Uuid,
        kind: EntryKind,
        id: Uuid,
    ) -> RepositoryResult<SettlementOutcome> {
        let txn = self.db.begin().await?;

        let entry = find_owned(&txn, company_id, kind, id).await?;
        if !entry.is_paid {
            return Err(RepositoryError::rejected(
                "not_paid",
                format!("{} is not paid", kind.label()),
            ));
        }

        let paid = entry.paid_amount_cents.unwrap_or(0);
        let account = match entry.paid_bank_account_id {
            Some(account_id) => {
                let account = accounts::find_owned(&txn, company_id, account_id).await?;
                let (movement_kind, delta) = match kind {
                    EntryKind::Payable => (BankTransactionKind::PayableReversal, paid),
                    EntryKind::Receivable => (BankTransactionKind::ReceivableReversal, -paid),
                };
                let movement = Movement {
                    kind: movement_kind,
                    amount_cents: delta,
                    reference_id: Some(entry.id),
                    description: Some(format!("Reversal: {}", entry.description)),
                };
                Some(accounts::apply_movement(&txn, account, movement).await?)
            }
            None => None,
        };

        let mut active: financial_entry::ActiveModel = entry.into();
        active.is_paid = Set(false);
        active.paid_date = Set(None);
        active.paid_amount_cents = Set(None);
        active.interest_cents = Set(0);
        active.discount_cents = Set(0);
        active.paid_bank_account_id = Set(None);
        active.updated_at = Set(Utc::now());
        let entry = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            company_id = %company_id,
            entry_id = %entry.id,
            kind = ?kind,
            "Financial entry reversed"
        );
        Ok(SettlementOutcome {
            entry,
            bank_account: account,
        })
    }
}

/// `amount + interest - discount`, rejected when negative or out of range.
fn settled_total(amount: i64, interest: i64, discount: i64) -> RepositoryResult<i64> {
    let total = amount
        .checked_add(interest)
        .and_then(|sum| sum.checked_sub(discount))
        .ok_or_else(|| RepositoryError::Validation("settled total is out of range".to_string()))?;
    if total < 0 {
        return Err(RepositoryError::Validation(
            "discount cannot exceed amount plus interest".to_string(),
        ));
    }
    Ok(total)
}

fn insufficient_balance(required: i64, available: i64) -> RepositoryError {
    let shortfall = required.saturating_sub(available);
    RepositoryError::Rejected {
        code: "insufficient_balance",
        message: format!("Insufficient balance: short by {}", from_cents(shortfall)),
        details: Some(json!({
            "required": from_cents(required),
            "available": from_cents(available),
            "shortfall": from_cents(shortfall),
        })),
    }
}

fn ensure_unpaid(entry: &financial_entry::Model) -> RepositoryResult<()> {
    if entry.is_paid {
        return Err(RepositoryError::rejected(
            "already_paid",
            format!("{} is already paid; reverse it first", entry.kind.label()),
        ));
    }
    Ok(())
}

pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    kind: EntryKind,
    id: Uuid,
) -> RepositoryResult<financial_entry::Model> {
    let found = FinancialEntry::find_by_id(id)
        .filter(financial_entry::Column::Kind.eq(kind))
        .one(conn)
        .await?;
    owned(found, company_id, |e| e.company_id, kind.label())
}

/// Checks that every referenced row exists and belongs to `company_id`.
pub(crate) async fn check_references<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    contact_id: Option<Uuid>,
    category_id: Option<Uuid>,
    bank_account_id: Option<Uuid>,
) -> RepositoryResult<()> {
    if let Some(id) = contact_id {
        let found = contact::Entity::find_by_id(id).one(conn).await?;
        referenced(found, company_id, |c| c.company_id, "Contact")?;
    }
    if let Some(id) = category_id {
        let found = category::Entity::find_by_id(id).one(conn).await?;
        referenced(found, company_id, |c| c.company_id, "Category")?;
    }
    if let Some(id) = bank_account_id {
        let found = bank_account::Entity::find_by_id(id).one(conn).await?;
        referenced(found, company_id, |a| a.company_id, "Bank account")?;
    }
    Ok(())
}

/// Builder over a fresh entry row, shared with recurring generation.
pub(crate) struct EntryRow(pub(crate) financial_entry::ActiveModel);

pub(crate) fn new_active(company_id: Uuid, kind: EntryKind, now: chrono::DateTime<Utc>) -> EntryRow {
    EntryRow(financial_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        kind: Set(kind),
        notes: Set(None),
        installment_number: Set(1),
        installment_total: Set(1),
        installment_group_id: Set(None),
        recurring_rule_id: Set(None),
        is_paid: Set(false),
        paid_date: Set(None),
        paid_amount_cents: Set(None),
        interest_cents: Set(0),
        discount_cents: Set(0),
        paid_bank_account_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
}

impl EntryRow {
    pub(crate) fn with_description(mut self, description: String) -> Self {
        self.0.description = Set(description);
        self
    }

    pub(crate) fn with_amount(mut self, amount_cents: i64, due_date: NaiveDate) -> Self {
        self.0.amount_cents = Set(amount_cents);
        self.0.due_date = Set(due_date);
        self
    }

    pub(crate) fn with_links(
        mut self,
        contact_id: Option<Uuid>,
        category_id: Option<Uuid>,
        bank_account_id: Option<Uuid>,
    ) -> Self {
        self.0.contact_id = Set(contact_id);
        self.0.category_id = Set(category_id);
        self.0.bank_account_id = Set(bank_account_id);
        self
    }

    pub(crate) fn with_installment(mut self, number: i32, total: i32, group: Option<Uuid>) -> Self {
        self.0.installment_number = Set(number);
        self.0.installment_total = Set(total);
        self.0.installment_group_id = Set(group);
        self
    }

    pub(crate) fn with_notes(mut self, notes: Option<String>) -> Self {
        self.0.notes = Set(notes);
        self
    }

    pub(crate) fn with_rule(mut self, rule_id: Uuid) -> Self {
        self.0.recurring_rule_id = Set(Some(rule_id));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installments_sum_to_total_with_remainder_on_last() {
        let parts = split_installments(10_000, 3);
        assert_eq!(parts, vec![3333, 3333, 3334]);
        assert_eq!(parts.iter().sum::<i64>(), 10_000);
    }

    #[test]
    fn single_installment_is_whole_amount() {
        assert_eq!(split_installments(1999, 1), vec![1999]);
    }

    #[test]
    fn settled_total_rejects_overflow_and_negative_totals() {
        assert_eq!(settled_total(20_000, 1_050, 50).unwrap(), 21_000);
        assert!(matches!(
            settled_total(i64::MAX, 1, 0),
            Err(RepositoryError::Validation(msg)) if msg == "settled total is out of range"
        ));
        assert!(matches!(
            settled_total(100, 0, 101),
            Err(RepositoryError::Validation(_))
        ));
    }

    #[test]
    fn shortfall_saturates_against_deep_overdraft() {
        match insufficient_balance(100, i64::MIN) {
            RepositoryError::Rejected { details, .. } => {
                assert_eq!(details.unwrap()["shortfall"], json!(from_cents(i64::MAX)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn insufficient_balance_reports_shortfall() {
        let err = insufficient_balance(15_000, 10_000);
        match err {
            RepositoryError::Rejected { code, details, .. } => {
                assert_eq!(code, "insufficient_balance");
                let details = details.unwrap();
                assert_eq!(details["shortfall"], json!(50.0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
