//! Conversion between API amounts and stored minor units (cents).

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::error::{ApiError, validation};

/// Largest magnitude accepted for a single amount: one trillion in major
/// units. Sums of a handful of such amounts stay far from `i64::MAX`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000;

/// Converts an API amount to cents, rounding half away from zero.
/// `None` when the amount exceeds [`MAX_AMOUNT_CENTS`].
pub fn to_cents(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .filter(|cents| cents.checked_abs().is_some_and(|abs| abs <= MAX_AMOUNT_CENTS))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Validates a strictly positive amount named `field` and returns its cents.
pub fn positive_cents(field: &str, amount: Decimal) -> Result<i64, ApiError> {
    match to_cents(amount) {
        Some(cents) if cents > 0 => Ok(cents),
        Some(_) => Err(validation(format!("{field} must be greater than zero"))),
        None => Err(validation(format!("{field} is out of range"))),
    }
}

/// Validates an optional amount that may be zero but not negative.
pub fn non_negative_cents(field: &str, amount: Option<Decimal>) -> Result<i64, ApiError> {
    let Some(amount) = amount else {
        return Ok(0);
    };
    match to_cents(amount) {
        Some(cents) if cents >= 0 => Ok(cents),
        Some(_) => Err(validation(format!("{field} must not be negative"))),
        None => Err(validation(format!("{field} is out of range"))),
    }
}

/// Any finite amount, negatives allowed (opening balances).
pub fn signed_cents(field: &str, amount: Decimal) -> Result<i64, ApiError> {
    to_cents(amount).ok_or_else(|| validation(format!("{field} is out of range")))
}
