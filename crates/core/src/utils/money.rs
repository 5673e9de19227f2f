//! Money helpers. All amounts inside the engine are `i64` cents.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::{Result, ValidationError};

/// Formats cents as a dollar string, e.g. `12345` -> `"$123.45"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses a user-entered dollar amount (`"12.5"`, `"$1,200.00"`) into cents.
///
/// Rejects more than two fractional digits rather than rounding them away.
pub fn parse_amount(input: &str) -> Result<i64> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return Err(ValidationError::MissingField("amount".to_string()).into());
    }

    let value = Decimal::from_str(&cleaned)?.normalize();
    if value.scale() > 2 {
        return Err(ValidationError::InvalidInput(format!(
            "amount '{}' has more than two decimal places",
            input.trim()
        ))
        .into());
    }

    (value * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| ValidationError::InvalidInput(format!("amount '{}' is out of range", input)).into())
}

/// Converts a provider decimal (dollars) into cents, rounding half away from zero.
pub fn decimal_to_cents(value: Decimal) -> Option<i64> {
    (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
