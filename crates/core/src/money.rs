//! Money representation and rounding rules.
//!
//! All monetary amounts are integer cents (`i64`). VAT rates are decimal
//! fractions (`rust_decimal::Decimal`). Rounding happens once, on the final
//! step of a calculation, using round-half-away-from-zero. Intermediate
//! per-unit values are never rounded before multiplying by quantity.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Amount in the smallest currency unit.
pub type Cents = i64;

/// Apply a fractional rate to an amount in cents, rounding the final result
/// half away from zero.
///
/// `apply_rate(1000, 0.25) == 250`; `apply_rate(50, 0.255) == 13`.
pub fn apply_rate(amount: Cents, rate: Decimal) -> DomainResult<Cents> {
    let exact = Decimal::from(amount) * rate;
    let rounded = exact.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded
        .to_i64()
        .ok_or_else(|| DomainError::validation(format!("amount out of range: {exact}")))
}

/// Normalize a VAT rate to at most four decimal places (half away from zero).
///
/// Rates are fractions (`0.25` for 25%), so four decimal places covers the
/// four significant digits the domain allows.
pub fn normalize_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}
