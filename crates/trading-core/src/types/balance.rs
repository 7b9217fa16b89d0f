//! Wallet balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DataError;

/// Snapshot of available volume per asset, as reported in one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    assets: HashMap<String, Decimal>,
}

impl Balances {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the available volume of an asset.
    pub fn with(mut self, asset: impl Into<String>, available: Decimal) -> Self {
        self.assets.insert(asset.into(), available);
        self
    }

    /// Overwrite the available volume of an asset in place.
    pub fn set(&mut self, asset: impl Into<String>, available: Decimal) {
        self.assets.insert(asset.into(), available);
    }

    /// Available volume, failing when the exchange reported no row for the asset.
    pub fn available(&self, asset: &str) -> Result<Decimal, DataError> {
        self.assets
            .get(asset)
            .copied()
            .ok_or_else(|| DataError::MissingBalance(asset.to_string()))
    }

    /// Available volume, treating a missing row as nothing held.
    pub fn available_or_zero(&self, asset: &str) -> Decimal {
        self.assets.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Number of assets reported.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Iterate over (asset, available) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.assets.iter()
    }
}

impl FromIterator<(String, Decimal)> for Balances {
    fn from_iter<T: IntoIterator<Item = (String, Decimal)>>(iter: T) -> Self {
        Self {
            assets: iter.into_iter().collect(),
        }
    }
}
