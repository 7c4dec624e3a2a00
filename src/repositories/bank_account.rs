//! # Bank Account Repository
//!
//! CRUD for bank accounts plus the balance-movement primitive shared by
//! payable/receivable settlement. Movements are a read-modify-write of
//! `current_balance_cents` executed on the caller's transaction; no row lock
//! is taken.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, owned};
use crate::models::bank_account::{self, Entity as BankAccount};
use crate::models::bank_transaction::{self, BankTransactionKind, Entity as BankTransaction};
use crate::models::{financial_entry, recurring_rule};

#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub name: String,
    pub bank_code: Option<String>,
    pub agency: Option<String>,
    pub account_number: Option<String>,
    pub initial_balance_cents: i64,
    pub overdraft_limit_cents: i64,
}

/// Metadata that may change after creation. Balances only move through
/// settlements.
#[derive(Debug, Clone, Default)]
pub struct BankAccountPatch {
    pub name: Option<String>,
    pub bank_code: Option<Option<String>>,
    pub agency: Option<Option<String>>,
    pub account_number: Option<Option<String>>,
    pub overdraft_limit_cents: Option<i64>,
    pub is_active: Option<bool>,
}

/// One signed change to an account balance.
#[derive(Debug, Clone)]
pub struct Movement {
    pub kind: BankTransactionKind,
    pub amount_cents: i64,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
}

pub struct BankAccountRepository {
    db: Arc<DatabaseConnection>,
}

impl BankAccountRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self, company_id: Uuid) -> RepositoryResult<Vec<bank_account::Model>> {
        Ok(BankAccount::find()
            .filter(bank_account::Column::CompanyId.eq(company_id))
            .order_by_asc(bank_account::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<bank_account::Model> {
        find_owned(&*self.db, company_id, id).await
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        input: NewBankAccount,
    ) -> RepositoryResult<bank_account::Model> {
        let now = Utc::now();
        let account = bank_account::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(input.name),
            bank_code: Set(input.bank_code),
            agency: Set(input.agency),
            account_number: Set(input.account_number),
            initial_balance_cents: Set(input.initial_balance_cents),
            current_balance_cents: Set(input.initial_balance_cents),
            overdraft_limit_cents: Set(input.overdraft_limit_cents),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(account.insert(&*self.db).await?)
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        patch: BankAccountPatch,
    ) -> RepositoryResult<bank_account::Model> {
        let existing = find_owned(&*self.db, company_id, id).await?;
        let mut active: bank_account::ActiveModel = existing.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(bank_code) = patch.bank_code {
            active.bank_code = Set(bank_code);
        }
        if let Some(agency) = patch.agency {
            active.agency = Set(agency);
        }
        if let Some(account_number) = patch.account_number {
            active.account_number = Set(account_number);
        }
        if let Some(limit) = patch.overdraft_limit_cents {
            active.overdraft_limit_cents = Set(limit);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes an account no payable, receivable or recurring rule points at.
    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let account = find_owned(&*self.db, company_id, id).await?;

        let entries = financial_entry::Entity::find()
            .filter(financial_entry::Column::CompanyId.eq(company_id))
            .filter(
                Condition::any()
                    .add(financial_entry::Column::BankAccountId.eq(account.id))
                    .add(financial_entry::Column::PaidBankAccountId.eq(account.id)),
            )
            .count(&*self.db)
            .await?;
        let rules = recurring_rule::Entity::find()
            .filter(recurring_rule::Column::CompanyId.eq(company_id))
            .filter(recurring_rule::Column::BankAccountId.eq(account.id))
            .count(&*self.db)
            .await?;

        if entries > 0 || rules > 0 {
            return Err(RepositoryError::rejected(
                "bank_account_in_use",
                format!(
                    "Bank account is referenced by {entries} payables/receivables and {rules} recurring rules"
                ),
            ));
        }

        BankAccount::delete_by_id(account.id).exec(&*self.db).await?;
        Ok(())
    }

    /// Balance history, newest first.
    pub async fn history(
        &self,
        company_id: Uuid,
        id: Uuid,
    ) -> RepositoryResult<Vec<bank_transaction::Model>> {
        let account = find_owned(&*self.db, company_id, id).await?;
        Ok(BankTransaction::find()
            .filter(bank_transaction::Column::CompanyId.eq(company_id))
            .filter(bank_transaction::Column::BankAccountId.eq(account.id))
            .order_by_desc(bank_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    id: Uuid,
) -> RepositoryResult<bank_account::Model> {
    let found = BankAccount::find_by_id(id).one(conn).await?;
    owned(found, company_id, |a| a.company_id, "Bank account")
}

/// Applies `movement` to `account` and appends the history row.
pub(crate) async fn apply_movement<C: ConnectionTrait>(
    conn: &C,
    account: bank_account::Model,
    movement: Movement,
) -> RepositoryResult<bank_account::Model> {
    let balance_after = account
        .current_balance_cents
        .checked_add(movement.amount_cents)
        .ok_or_else(|| RepositoryError::Validation("balance overflow".to_string()))?;

    let company_id = account.company_id;
    let account_id = account.id;
    let mut active: bank_account::ActiveModel = account.into();
    active.current_balance_cents = Set(balance_after);
    active.updated_at = Set(Utc::now());
    let updated = active.update(conn).await?;

    bank_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        bank_account_id: Set(account_id),
        kind: Set(movement.kind),
        amount_cents: Set(movement.amount_cents),
        balance_after_cents: Set(balance_after),
        reference_id: Set(movement.reference_id),
        description: Set(movement.description),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    tracing::debug!(
        bank_account_id = %account_id,
        kind = ?movement.kind,
        amount_cents = movement.amount_cents,
        balance_after_cents = balance_after,
        "Bank balance moved"
    );

    Ok(updated)
}
