//! Recurring rule persistence and on-demand materialisation.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::financial_entry::{check_references, new_active};
use super::{RepositoryError, RepositoryResult, owned};
use crate::models::financial_entry::{self, EntryKind};
use crate::models::recurring_rule::{self, Entity as RecurringRule, Frequency};

/// Upper bound on entries produced by one `generate` call.
pub const MAX_OCCURRENCES_PER_CALL: usize = 366;

#[derive(Debug, Clone)]
pub struct RuleInput {
    pub kind: EntryKind,
    pub description: String,
    pub amount_cents: i64,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub contact_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub rule: recurring_rule::Model,
    pub entries: Vec<financial_entry::Model>,
}

/// Due dates strictly after `after` (or from `start` when nothing was
/// generated yet) up to `until`, capped at `limit`.
pub fn pending_occurrences(
    frequency: Frequency,
    start: NaiveDate,
    end: Option<NaiveDate>,
    after: Option<NaiveDate>,
    until: NaiveDate,
    limit: usize,
) -> Vec<NaiveDate> {
    let horizon = match end {
        Some(end) if end < until => end,
        _ => until,
    };
    let mut dates = Vec::new();
    for n in 0u32.. {
        let Some(date) = frequency.nth_occurrence(start, n) else {
            break;
        };
        if date > horizon || dates.len() >= limit {
            break;
        }
        if after.is_none_or(|after| date > after) {
            dates.push(date);
        }
    }
    dates
}

pub struct RecurringRuleRepository {
    db: Arc<DatabaseConnection>,
}

impl RecurringRuleRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self, company_id: Uuid) -> RepositoryResult<Vec<recurring_rule::Model>> {
        Ok(RecurringRule::find()
            .filter(recurring_rule::Column::CompanyId.eq(company_id))
            .order_by_asc(recurring_rule::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<recurring_rule::Model> {
        let found = RecurringRule::find_by_id(id).one(&*self.db).await?;
        owned(found, company_id, |r| r.company_id, "Recurring rule")
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        input: RuleInput,
    ) -> RepositoryResult<recurring_rule::Model> {
        validate(&input)?;
        check_references(
            &*self.db,
            company_id,
            input.contact_id,
            input.category_id,
            input.bank_account_id,
        )
        .await?;
        let now = Utc::now();
        Ok(recurring_rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            kind: Set(input.kind),
            description: Set(input.description),
            amount_cents: Set(input.amount_cents),
            frequency: Set(input.frequency),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            contact_id: Set(input.contact_id),
            category_id: Set(input.category_id),
            bank_account_id: Set(input.bank_account_id),
            is_active: Set(input.is_active),
            last_generated_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?)
    }

    /// Replaces the rule definition. `last_generated_date` is preserved, so
    /// already materialised occurrences are not produced again.
    pub async fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        input: RuleInput,
    ) -> RepositoryResult<recurring_rule::Model> {
        validate(&input)?;
        let existing = self.get(company_id, id).await?;
        check_references(
            &*self.db,
            company_id,
            input.contact_id,
            input.category_id,
            input.bank_account_id,
        )
        .await?;
        let mut active: recurring_rule::ActiveModel = existing.into();
        active.kind = Set(input.kind);
        active.description = Set(input.description);
        active.amount_cents = Set(input.amount_cents);
        active.frequency = Set(input.frequency);
        active.start_date = Set(input.start_date);
        active.end_date = Set(input.end_date);
        active.contact_id = Set(input.contact_id);
        active.category_id = Set(input.category_id);
        active.bank_account_id = Set(input.bank_account_id);
        active.is_active = Set(input.is_active);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes the rule; entries already generated from it stay.
    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let existing = self.get(company_id, id).await?;
        RecurringRule::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Materialises every pending occurrence up to `until` in one transaction
    /// and advances `last_generated_date`.
    pub async fn generate(
        &self,
        company_id: Uuid,
        id: Uuid,
        until: NaiveDate,
    ) -> RepositoryResult<Generated> {
        let txn = self.db.begin().await?;

        let found = RecurringRule::find_by_id(id).one(&txn).await?;
        let rule = owned(found, company_id, |r| r.company_id, "Recurring rule")?;
        if !rule.is_active {
            return Err(RepositoryError::rejected(
                "rule_inactive",
                "Recurring rule is inactive",
            ));
        }

        let dates = pending_occurrences(
            rule.frequency,
            rule.start_date,
            rule.end_date,
            rule.last_generated_date,
            until,
            MAX_OCCURRENCES_PER_CALL,
        );

        let now = Utc::now();
        let mut entries = Vec::with_capacity(dates.len());
        for due_date in &dates {
            let row = new_active(company_id, rule.kind, now)
                .with_description(rule.description.clone())
                .with_amount(rule.amount_cents, *due_date)
                .with_links(rule.contact_id, rule.category_id, rule.bank_account_id)
                .with_rule(rule.id);
            entries.push(row.0.insert(&txn).await?);
        }

        let rule = match dates.last() {
            Some(last) => {
                let mut active: recurring_rule::ActiveModel = rule.into();
                active.last_generated_date = Set(Some(*last));
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => rule,
        };

        txn.commit().await?;

        tracing::info!(
            company_id = %company_id,
            rule_id = %rule.id,
            generated = entries.len(),
            "Recurring rule materialised"
        );
        Ok(Generated { rule, entries })
    }
}

fn validate(input: &RuleInput) -> RepositoryResult<()> {
    if input.description.trim().is_empty() {
        return Err(RepositoryError::Validation(
            "description is required".to_string(),
        ));
    }
    if input.amount_cents <= 0 {
        return Err(RepositoryError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if input.end_date.is_some_and(|end| end < input.start_date) {
        return Err(RepositoryError::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_run_includes_start_date() {
        let dates = pending_occurrences(
            Frequency::Monthly,
            date(2025, 1, 10),
            None,
            None,
            date(2025, 3, 10),
            366,
        );
        assert_eq!(dates, vec![date(2025, 1, 10), date(2025, 2, 10), date(2025, 3, 10)]);
    }

    #[test]
    fn resumes_after_last_generated() {
        let dates = pending_occurrences(
            Frequency::Weekly,
            date(2025, 1, 1),
            None,
            Some(date(2025, 1, 8)),
            date(2025, 1, 22),
            366,
        );
        assert_eq!(dates, vec![date(2025, 1, 15), date(2025, 1, 22)]);
    }

    #[test]
    fn end_date_and_limit_bound_the_run() {
        let dates = pending_occurrences(
            Frequency::Monthly,
            date(2025, 1, 1),
            Some(date(2025, 2, 15)),
            None,
            date(2026, 1, 1),
            366,
        );
        assert_eq!(dates.len(), 2);

        let capped = pending_occurrences(
            Frequency::Weekly,
            date(2000, 1, 1),
            None,
            None,
            date(2030, 1, 1),
            MAX_OCCURRENCES_PER_CALL,
        );
        assert_eq!(capped.len(), MAX_OCCURRENCES_PER_CALL);
    }
}
