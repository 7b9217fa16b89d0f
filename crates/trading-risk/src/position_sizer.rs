//! Position sizing.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::error::DataError;

/// Convert a market price into a decimal, rejecting NaN, infinities and
/// non-positive values.
pub fn to_decimal(value: f64) -> Result<Decimal, DataError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DataError::Parse(format!("invalid price {}", value)));
    }
    Decimal::from_f64(value)
        .map(|d| d.normalize())
        .ok_or_else(|| DataError::Parse(format!("price {} out of decimal range", value)))
}

/// Commits a fixed fraction of the available balance to each entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSizer {
    /// Fraction of the balance to spend, in (0, 1]
    pub rate: Decimal,
    /// Volume precision accepted by the exchange for the pair
    pub volume_decimals: u32,
}

impl Default for UtilizationSizer {
    fn default() -> Self {
        Self {
            rate: dec!(0.95),
            volume_decimals: 8,
        }
    }
}

impl UtilizationSizer {
    pub fn new(rate: Decimal, volume_decimals: u32) -> Self {
        Self {
            rate,
            volume_decimals,
        }
    }

    /// Volume of the trade currency to buy: `balance * rate / price`.
    ///
    /// Rounded toward zero so the order never asks for more than the
    /// utilised balance covers.
    pub fn size(&self, balance: Decimal, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO || balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let volume = balance * self.rate / price;
        volume.round_dp_with_strategy(self.volume_decimals, RoundingStrategy::ToZero)
    }
}
