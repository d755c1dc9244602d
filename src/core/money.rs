use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::{AppError, Result};

/// Decimal places carried by stored amounts.
pub const SCALE: u32 = 2;

/// Rounds an amount to cents, half away from zero.
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a major-unit amount to processor minor units: `round(amount * 100)`.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::validation(format!("Amount {} is out of range", amount)))
}

/// Converts processor minor units back to a major-unit amount.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, SCALE)
}

/// Validates that an amount is strictly positive and has at most two decimals.
pub fn validate_positive(amount: Decimal, field: &str) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(format!(
            "{} must be greater than zero",
            field
        )));
    }

    if amount.normalize().scale() > SCALE {
        return Err(AppError::validation(format!(
            "{} must have at most {} decimal places",
            field, SCALE
        )));
    }

    Ok(())
}
