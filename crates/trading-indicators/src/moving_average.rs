//! Moving average indicators.

use serde::{Deserialize, Serialize};
use std::fmt;
use trading_core::traits::Indicator;

/// Which moving average an enrichment column uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaType {
    /// Simple moving average
    #[default]
    Sma,
    /// Exponential moving average, seeded with the SMA of the first window
    Ema,
    /// Linearly weighted moving average
    Wma,
}

impl MaType {
    /// Calculate this moving average over `data` with the given period.
    ///
    /// Returns `data.len() - period + 1` values, or nothing when `period`
    /// is zero or larger than the data.
    pub fn calculate(&self, data: &[f64], period: usize) -> Vec<f64> {
        if period == 0 {
            return vec![];
        }
        match self {
            MaType::Sma => Sma::new(period).calculate(data),
            MaType::Ema => Ema::new(period).calculate(data),
            MaType::Wma => Wma::new(period).calculate(data),
        }
    }
}

impl fmt::Display for MaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaType::Sma => write!(f, "SMA"),
            MaType::Ema => write!(f, "EMA"),
            MaType::Wma => write!(f, "WMA"),
        }
    }
}

/// Simple Moving Average (SMA).
///
/// Calculates the arithmetic mean of the last N values.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// Create a new SMA with the specified period.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        let mut result = Vec::with_capacity(data.len() - self.period + 1);
        let period_f64 = self.period as f64;

        let mut sum: f64 = data[..self.period].iter().sum();
        result.push(sum / period_f64);

        // Sliding window
        for i in self.period..data.len() {
            sum = sum - data[i - self.period] + data[i];
            result.push(sum / period_f64);
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

/// Exponential Moving Average (EMA).
///
/// Gives more weight to recent prices using an exponential decay.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
}

impl Ema {
    /// Create a new EMA with the specified period.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self { period, multiplier }
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        let mut result = Vec::with_capacity(data.len() - self.period + 1);

        // Seed with the SMA of the first window
        let initial_sma: f64 = data[..self.period].iter().sum::<f64>() / self.period as f64;
        result.push(initial_sma);

        let mut ema = initial_sma;
        let one_minus_mult = 1.0 - self.multiplier;

        for &price in &data[self.period..] {
            ema = price * self.multiplier + ema * one_minus_mult;
            result.push(ema);
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

/// Weighted Moving Average (WMA).
///
/// Gives linearly decreasing weights to older prices.
#[derive(Debug, Clone)]
pub struct Wma {
    period: usize,
    weights_sum: f64,
}

impl Wma {
    /// Create a new WMA with the specified period.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        // 1 + 2 + ... + n
        let weights_sum = (period * (period + 1)) as f64 / 2.0;
        Self { period, weights_sum }
    }
}

impl Indicator for Wma {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        data.windows(self.period)
            .map(|window| {
                let weighted_sum: f64 = window
                    .iter()
                    .enumerate()
                    .map(|(i, &price)| price * (i + 1) as f64)
                    .sum();
                weighted_sum / self.weights_sum
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "WMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let sma = Sma::new(3);
        let result = sma.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 1e-10);
        assert!((result[1] - 3.0).abs() < 1e-10);
        assert!((result[2] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let sma = Sma::new(5);
        assert!(sma.calculate(&[1.0, 2.0, 3.0]).is_empty());
    }

    #[test]
    fn test_ema() {
        let ema = Ema::new(3);
        let result = ema.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 1e-10);
        // mult = 0.5: 4 * 0.5 + 2 * 0.5
        assert!((result[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_wma() {
        let wma = Wma::new(3);
        let result = wma.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(result.len(), 3);
        // (1*1 + 2*2 + 3*3) / 6
        assert!((result[0] - 14.0 / 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_ma_type_zero_period_is_empty() {
        assert!(MaType::Sma.calculate(&[1.0, 2.0], 0).is_empty());
        assert_eq!(MaType::Ema.calculate(&[1.0, 2.0], 2).len(), 1);
    }

    #[test]
    fn test_ma_type_serde() {
        let t: MaType = serde_json::from_str("\"wma\"").unwrap();
        assert_eq!(t, MaType::Wma);
        assert_eq!(MaType::default(), MaType::Sma);
    }
}
