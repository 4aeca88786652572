//! Fixed-point representation of exchange rates.
//!
//! Rates are carried as integers scaled by [`RATE_DECIMALS`] decimal digits,
//! the smallest-unit value of one base coin in the quoted currency. Parsing
//! and rescaling go through [`rust_decimal::Decimal`] so repeated conversion
//! never drifts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

/// Number of decimal digits a scaled rate carries.
pub const RATE_DECIMALS: u32 = 8;

/// Multiplier between a decimal rate and its scaled integer form.
pub const RATE_SCALE: i64 = 100_000_000;

/// Parses a decimal string into a scaled rate, rounding half away from zero
/// at the last digit. `None` for unparseable input or values out of range.
pub fn to_scaled(s: &str) -> Option<i64> {
    let value = Decimal::from_str(s.trim()).ok()?;
    value
        .checked_mul(Decimal::from(RATE_SCALE))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// The decimal value of a scaled rate.
pub fn from_scaled(rate: i64) -> Decimal {
    Decimal::new(rate, RATE_DECIMALS)
}

/// Product of two scaled rates, rescaled with the remainder rounded half away
/// from zero rather than truncated.
pub fn mul_scaled(a: i64, b: i64) -> i64 {
    let product = i128::from(a) * i128::from(b);
    let half = i128::from(RATE_SCALE) / 2;
    let adjusted = if product >= 0 {
        product + half
    } else {
        product - half
    };
    (adjusted / i128::from(RATE_SCALE)).clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Scaled rate from a JSON value that may be a string, a number, or an array
/// whose first element holds the quote.
pub(crate) fn value_to_scaled(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => to_scaled(s),
        Value::Number(n) => to_scaled(&n.to_string()),
        Value::Array(items) => items.first().and_then(value_to_scaled),
        _ => None,
    }
}
