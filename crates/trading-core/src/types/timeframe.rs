//! Candle timeframes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle period. Limited to the granularities the exchange serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    /// 1 minute candles
    #[default]
    #[serde(rename = "1m")]
    Minute1,
    /// 5 minute candles
    #[serde(rename = "5m")]
    Minute5,
    /// 15 minute candles
    #[serde(rename = "15m")]
    Minute15,
    /// 30 minute candles
    #[serde(rename = "30m")]
    Minute30,
    /// 1 hour candles
    #[serde(rename = "1h")]
    Hour1,
    /// 4 hour candles
    #[serde(rename = "4h")]
    Hour4,
    /// Daily candles
    #[serde(rename = "1d")]
    Daily,
    /// Weekly candles
    #[serde(rename = "1w")]
    Weekly,
}

impl Timeframe {
    /// Get the duration in minutes, which is how the OHLC endpoint names intervals.
    pub fn as_minutes(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
            Timeframe::Daily => 1440,
            Timeframe::Weekly => 10080,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Daily => "1d",
            Timeframe::Weekly => "1w",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "minute" => Ok(Timeframe::Minute1),
            "5m" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "30min" => Ok(Timeframe::Minute30),
            "1h" | "1hour" | "hour" => Ok(Timeframe::Hour1),
            "4h" | "4hour" => Ok(Timeframe::Hour4),
            "1d" | "day" | "daily" => Ok(Timeframe::Daily),
            "1w" | "week" | "weekly" => Ok(Timeframe::Weekly),
            _ => Err(format!("Invalid timeframe: {}", s)),
        }
    }
}
