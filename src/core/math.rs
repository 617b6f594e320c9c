//! Fixed-point arithmetic for fees and proportional shares.
//!
//! All money math goes through [`mul_div`], which widens the product to
//! 256 bits and divides once, so `a * b` never overflows and no rounding
//! happens before the final floor.

use crate::core::error::MathError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[allow(clippy::manual_div_ceil, clippy::assign_op_pattern, clippy::ptr_offset_with_cast)]
mod bn {
    uint::construct_uint! {
        /// 256-bit unsigned integer used for intermediate products.
        pub struct U256(4);
    }
}

pub use bn::U256;

/// Token amount in base units.
pub type Amount = u128;

/// Fixed-point denominator: `SCALE` represents 1.0.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Origination fees above 5% are rejected.
pub const MAX_ORIGINATION_FEE_RATE: FeeRate = FeeRate(SCALE / 20);

/// `floor(a * b / denominator)` with a full-width intermediate product.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    // u128 * u128 always fits in 256 bits
    let product = U256::from(a) * U256::from(b);
    let quotient = product / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(quotient.low_u128())
}

/// `floor(amount * rate / SCALE)`.
pub fn fee(amount: Amount, rate: FeeRate) -> Result<Amount, MathError> {
    mul_div(amount, rate.raw(), SCALE)
}

/// Split a received amount into `(fee, remainder)`.
pub fn split_fee(amount: Amount, rate: FeeRate) -> Result<(Amount, Amount), MathError> {
    let fee = fee(amount, rate)?;
    let rest = amount.checked_sub(fee).ok_or(MathError::Underflow)?;
    Ok((fee, rest))
}

/// A rate expressed in `SCALE` units (`SCALE / 100` is 1%).
///
/// # Examples
///
/// ```
/// use collateral_ledger::core::math::{FeeRate, SCALE};
/// use rust_decimal_macros::dec;
///
/// let one_percent = FeeRate::from_decimal(dec!(0.01)).unwrap();
/// assert_eq!(one_percent.raw(), SCALE / 100);
/// assert_eq!(one_percent.to_string(), "1%");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(u128);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0);

    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Build a rate from a fraction (`0.01` = 1%). Negative values and
    /// precision finer than `1 / SCALE` are rejected.
    pub fn from_decimal(fraction: Decimal) -> Option<Self> {
        if fraction.is_sign_negative() {
            return None;
        }
        let scaled = fraction.checked_mul(Decimal::from(SCALE as u64))?;
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        scaled.to_u128().map(Self)
    }

    /// The rate as a fraction, if it fits a `Decimal`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        let raw = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(raw, 18)
            .ok()
            .map(|d| d.normalize())
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Some(fraction) => write!(f, "{}%", (fraction * Decimal::ONE_HUNDRED).normalize()),
            None => write!(f, "{}/{}", self.0, SCALE),
        }
    }
}

/// Render a base-unit amount with the given number of decimals.
///
/// Falls back to the raw integer when the value is beyond `Decimal` range.
pub fn format_units(amount: Amount, decimals: u32) -> String {
    i128::try_from(amount)
        .ok()
        .and_then(|raw| Decimal::try_from_i128_with_scale(raw, decimals).ok())
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|| amount.to_string())
}
