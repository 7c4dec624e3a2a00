//! Recurring payable/receivable rules.

use chrono::{Duration, Months, NaiveDate};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::financial_entry::EntryKind;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

impl Frequency {
    /// The `n`th occurrence counted from `start` (n = 0 is `start` itself).
    ///
    /// Monthly and yearly steps are computed from the anchor rather than from
    /// the previous occurrence, so a rule starting on the 31st lands on the
    /// last day of shorter months and returns to the 31st afterwards.
    pub fn nth_occurrence(self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Frequency::Weekly => start.checked_add_signed(Duration::weeks(i64::from(n))),
            Frequency::Monthly => start.checked_add_months(Months::new(n)),
            Frequency::Yearly => start.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recurring_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
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
    /// Due date of the latest materialised occurrence
    pub last_generated_date: Option<NaiveDate>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        let start = date(2025, 1, 31);
        assert_eq!(Frequency::Monthly.nth_occurrence(start, 1), Some(date(2025, 2, 28)));
        assert_eq!(Frequency::Monthly.nth_occurrence(start, 2), Some(date(2025, 3, 31)));
    }

    #[test]
    fn weekly_and_yearly_steps() {
        let start = date(2024, 2, 29);
        assert_eq!(Frequency::Weekly.nth_occurrence(start, 2), Some(date(2024, 3, 14)));
        assert_eq!(Frequency::Yearly.nth_occurrence(start, 1), Some(date(2025, 2, 28)));
        assert_eq!(Frequency::Yearly.nth_occurrence(start, 4), Some(date(2028, 2, 29)));
    }
}
