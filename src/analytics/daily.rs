//! Per-day revenue and order counts.

use chrono::{FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use utoipa::ToSchema;

use super::{DateRange, RevenueMode, local_day};
use crate::marketplace::types::Order;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: u64,
    /// Net mode only: some order fell back to its gross amount
    pub approximated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub mode: RevenueMode,
    pub days: Vec<DailyPoint>,
    pub total_revenue: Decimal,
    pub total_orders: u64,
    pub average_order_value: Decimal,
}

/// One zero-filled point for every day of `range`; paid orders only.
pub fn daily_report(
    orders: &[Order],
    range: &DateRange,
    offset: FixedOffset,
    mode: RevenueMode,
) -> DailyReport {
    let mut buckets: BTreeMap<NaiveDate, DailyPoint> = range
        .days()
        .map(|date| {
            (
                date,
                DailyPoint {
                    date,
                    revenue: Decimal::ZERO,
                    orders: 0,
                    approximated: false,
                },
            )
        })
        .collect();

    let mut seen = HashSet::new();
    for order in orders.iter().filter(|o| o.is_paid()) {
        if !seen.insert(order.id.as_str()) {
            continue;
        }
        let Some(point) = buckets.get_mut(&local_day(order, offset)) else {
            continue;
        };
        let (amount, approximated) = match mode {
            RevenueMode::Gross => (order.total_amount, false),
            RevenueMode::Net => match order.net_received() {
                Some(net) => (net, false),
                None => (order.total_amount, true),
            },
        };
        point.revenue += amount;
        point.orders += 1;
        point.approximated |= approximated;
    }

    let days: Vec<DailyPoint> = buckets
        .into_values()
        .map(|mut point| {
            point.revenue = point.revenue.round_dp(2);
            point
        })
        .collect();
    let total_revenue: Decimal = days.iter().map(|p| p.revenue).sum();
    let total_orders: u64 = days.iter().map(|p| p.orders).sum();
    let average_order_value = if total_orders == 0 {
        Decimal::ZERO
    } else {
        (total_revenue / Decimal::from(total_orders)).round_dp(2)
    };

    DailyReport {
        from: range.from(),
        to: range.to(),
        mode,
        days,
        total_revenue,
        total_orders,
        average_order_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn order(id: u64, status: &str, created: &str, closed: Option<&str>, total: f64) -> Order {
        serde_json::from_value(json!({
            "id": id,
            "status": status,
            "date_created": created,
            "date_closed": closed,
            "total_amount": total,
        }))
        .unwrap()
    }

    #[test]
    fn empty_range_is_zero_filled() {
        let range = DateRange::new(date(2025, 1, 1), date(2025, 1, 7)).unwrap();
        let report = daily_report(&[], &range, brt(), RevenueMode::Gross);
        assert_eq!(report.days.len(), 7);
        assert!(report.days.iter().all(|p| p.revenue.is_zero() && p.orders == 0));
        assert_eq!(report.average_order_value, Decimal::ZERO);
        assert_eq!(report.days[0].date, date(2025, 1, 1));
        assert_eq!(report.days[6].date, date(2025, 1, 7));
    }

    #[test]
    fn buckets_by_closing_time_in_merchant_offset() {
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 2)).unwrap();
        let orders = vec![
            // 01:30 UTC on the 2nd is still the 1st in -03:00
            order(1, "paid", "2025-03-01T10:00:00.000Z", Some("2025-03-02T01:30:00.000Z"), 100.0),
            order(2, "paid", "2025-03-02T12:00:00.000-03:00", None, 50.0),
            order(3, "cancelled", "2025-03-02T12:00:00.000-03:00", None, 999.0),
        ];
        let report = daily_report(&orders, &range, brt(), RevenueMode::Gross);
        assert_eq!(report.days[0].orders, 1);
        assert_eq!(report.days[0].revenue, Decimal::new(100, 0));
        assert_eq!(report.days[1].orders, 1);
        assert_eq!(report.total_orders, 2);
        assert_eq!(report.average_order_value, Decimal::new(75, 0));
    }

    #[test]
    fn net_mode_falls_back_per_order_and_flags_the_day() {
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 2)).unwrap();
        let with_net: Order = serde_json::from_value(json!({
            "id": 10,
            "status": "paid",
            "date_created": "2025-03-01T12:00:00.000-03:00",
            "total_amount": 100.0,
            "payments": [
                { "id": 1, "net_received_amount": 60.0 },
                { "id": 2, "net_received_amount": 28.5 }
            ]
        }))
        .unwrap();
        let without_net = order(11, "paid", "2025-03-02T12:00:00.000-03:00", None, 40.0);

        let report = daily_report(&[with_net, without_net], &range, brt(), RevenueMode::Net);
        assert_eq!(report.days[0].revenue, Decimal::new(885, 1));
        assert!(!report.days[0].approximated);
        assert_eq!(report.days[1].revenue, Decimal::new(40, 0));
        assert!(report.days[1].approximated);
    }
}
