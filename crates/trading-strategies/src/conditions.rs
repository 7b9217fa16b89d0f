//! Sub-conditions of the entry rule.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use trading_indicators::EnrichedRow;

/// One predicate over a row of an enriched series.
///
/// A condition whose inputs are undefined on the row (warm-up, unknown
/// label) evaluates to false.
pub trait EntryCondition: Send + Sync + Debug {
    /// Short human readable form, e.g. `ma(14m) > ma(12h)`.
    fn describe(&self) -> String;

    /// Evaluate on one row.
    fn evaluate(&self, row: &EnrichedRow<'_>) -> bool;

    /// Indicator labels the condition reads.
    fn labels(&self) -> Vec<&str>;
}

/// Short-window moving average above long-window moving average.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaAbove {
    pub short: String,
    pub long: String,
}

impl MaAbove {
    pub fn new(short: impl Into<String>, long: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            long: long.into(),
        }
    }
}

impl EntryCondition for MaAbove {
    fn describe(&self) -> String {
        format!("ma({}) > ma({})", self.short, self.long)
    }

    fn evaluate(&self, row: &EnrichedRow<'_>) -> bool {
        match (row.ma(&self.short), row.ma(&self.long)) {
            (Some(short), Some(long)) => short > long,
            _ => false,
        }
    }

    fn labels(&self) -> Vec<&str> {
        vec![self.short.as_str(), self.long.as_str()]
    }
}

/// Close of the candle above a moving average.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseAbove {
    pub label: String,
}

impl CloseAbove {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl EntryCondition for CloseAbove {
    fn describe(&self) -> String {
        format!("close > ma({})", self.label)
    }

    fn evaluate(&self, row: &EnrichedRow<'_>) -> bool {
        row.ma(&self.label).is_some_and(|ma| row.close() > ma)
    }

    fn labels(&self) -> Vec<&str> {
        vec![self.label.as_str()]
    }
}

/// Serialisable form of a condition, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionConfig {
    MaAbove { short: String, long: String },
    CloseAbove { label: String },
}

impl ConditionConfig {
    pub fn build(&self) -> Box<dyn EntryCondition> {
        match self {
            ConditionConfig::MaAbove { short, long } => Box::new(MaAbove::new(short, long)),
            ConditionConfig::CloseAbove { label } => Box::new(CloseAbove::new(label)),
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        match self {
            ConditionConfig::MaAbove { short, long } => vec![short.as_str(), long.as_str()],
            ConditionConfig::CloseAbove { label } => vec![label.as_str()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::Candle;
    use trading_indicators::{enrich, EnrichedSeries, MaType, WindowSpec};

    fn rising() -> EnrichedSeries {
        let candles = (0..6)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(i * 60, c, c, c, c, 1.0)
            })
            .collect();
        enrich(
            candles,
            &[WindowSpec::new(2, "fast"), WindowSpec::new(4, "slow")],
            MaType::Sma,
        )
    }

    #[test]
    fn test_ma_above_on_rising_prices() {
        let series = rising();
        let row = series.last_closed_row().unwrap();
        assert!(MaAbove::new("fast", "slow").evaluate(&row));
        assert!(!MaAbove::new("slow", "fast").evaluate(&row));
    }

    #[test]
    fn test_undefined_values_are_false() {
        let series = rising();
        let warmup = series.row(1).unwrap();
        assert!(!MaAbove::new("fast", "slow").evaluate(&warmup));
        let row = series.last_closed_row().unwrap();
        assert!(!MaAbove::new("fast", "nope").evaluate(&row));
    }

    #[test]
    fn test_close_above() {
        let series = rising();
        let row = series.last_closed_row().unwrap();
        assert!(CloseAbove::new("slow").evaluate(&row));
        assert_eq!(CloseAbove::new("slow").describe(), "close > ma(slow)");
    }

    #[test]
    fn test_condition_config_build() {
        let cfg = ConditionConfig::MaAbove {
            short: "14m".into(),
            long: "12h".into(),
        };
        assert_eq!(cfg.build().describe(), "ma(14m) > ma(12h)");
        assert_eq!(cfg.labels(), vec!["14m", "12h"]);
    }
}
