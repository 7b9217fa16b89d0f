//! OHLCV (Open, High, Low, Close, Volume) candle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One period of trading summarised as OHLCV.
/// Uses f64 for fast indicator calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Period start, Unix seconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Traded volume
    pub volume: f64,
}

impl Candle {
    /// Create a new candle.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Calculate the typical price (HLC average).
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Calculate the candle's range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check if the candle is bullish (close > open).
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Index of the last fully closed candle in an ascending series.
///
/// The newest candle is still forming, so a series needs at least two rows
/// before any candle counts as closed.
pub fn last_closed_index(len: usize) -> Option<usize> {
    len.checked_sub(2)
}

/// Typical price of the newest candle of an ascending series.
pub fn latest_typical_price(candles: &[Candle]) -> Option<f64> {
    candles.last().map(Candle::typical_price)
}

/// Extract close prices as a vector.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Check that timestamps are strictly ascending.
pub fn is_ascending(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}
