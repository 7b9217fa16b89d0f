//! Entry rule: conjunction of conditions on the last closed candle.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;
use trading_core::error::{DataError, StrategyError};
use trading_core::traits::StrategyConfig;
use trading_indicators::{EnrichedRow, EnrichedSeries, WindowSpec};

use crate::conditions::{ConditionConfig, EntryCondition};

/// Configuration for the entry rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRuleConfig {
    /// Moving-average windows the conditions may refer to
    pub windows: Vec<WindowSpec>,
    /// Conditions, all of which must hold
    pub conditions: Vec<ConditionConfig>,
    /// Enter on every row regardless of the conditions. Debug only.
    #[serde(default)]
    pub force: bool,
}

impl Default for EntryRuleConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                WindowSpec::new(14, "14m"),
                WindowSpec::new(21, "21m"),
                WindowSpec::new(30, "30m"),
                WindowSpec::new(60, "60m"),
                WindowSpec::new(60 * 12, "12h"),
            ],
            conditions: vec![ConditionConfig::MaAbove {
                short: "14m".to_string(),
                long: "12h".to_string(),
            }],
            force: false,
        }
    }
}

impl StrategyConfig for EntryRuleConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.windows.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one moving-average window required".into(),
            ));
        }
        let mut labels = HashSet::new();
        for window in &self.windows {
            if window.length == 0 {
                return Err(StrategyError::InvalidConfig(format!(
                    "Window '{}' must have a length greater than 0",
                    window.label
                )));
            }
            if !labels.insert(window.label.as_str()) {
                return Err(StrategyError::InvalidConfig(format!(
                    "Duplicate window label '{}'",
                    window.label
                )));
            }
        }
        if self.conditions.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one entry condition required".into(),
            ));
        }
        for label in self.conditions.iter().flat_map(|c| c.labels()) {
            if !labels.contains(label) {
                return Err(StrategyError::UnknownLabel(label.to_string()));
            }
        }
        Ok(())
    }
}

/// Outcome of evaluating the rule on the last closed candle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDecision {
    /// Whether to enter the market
    pub enter: bool,
    /// True when the force flag produced the decision
    pub forced: bool,
    /// Row the decision was taken on
    pub row_index: usize,
    /// Candle start, Unix seconds
    pub timestamp: i64,
    /// Close of the evaluated candle
    pub close: f64,
    /// Moving averages read by the conditions, in condition order
    pub indicators: Vec<(String, Option<f64>)>,
    /// Each condition with its result
    pub conditions: Vec<(String, bool)>,
}

impl EntryDecision {
    /// Value of one of the moving averages the conditions read.
    pub fn indicator(&self, label: &str) -> Option<f64> {
        self.indicators
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, v)| *v)
    }
}

/// Conjunction of entry conditions.
#[derive(Debug)]
pub struct EntryRule {
    conditions: Vec<Box<dyn EntryCondition>>,
    force: bool,
}

impl EntryRule {
    /// Create a rule from conditions.
    pub fn new(conditions: Vec<Box<dyn EntryCondition>>) -> Self {
        Self {
            conditions,
            force: false,
        }
    }

    /// Build from a validated configuration.
    pub fn from_config(config: &EntryRuleConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self::new(config.conditions.iter().map(ConditionConfig::build).collect())
            .with_force(config.force))
    }

    /// Add one more condition to the conjunction.
    pub fn and(mut self, condition: Box<dyn EntryCondition>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the force flag.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }

    fn conditions_hold(&self, row: &EnrichedRow<'_>) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.evaluate(row))
    }

    /// Entry flag for every row of the series, the live row included.
    pub fn flags(&self, series: &EnrichedSeries) -> Vec<bool> {
        if self.force {
            warn!("#### FORCING ENTRY: entry rule overridden for every row ####");
            return vec![true; series.len()];
        }
        series.rows().map(|row| self.conditions_hold(&row)).collect()
    }

    /// Decide on the newest fully closed candle.
    ///
    /// The newest candle is still forming and is never read.
    pub fn decide(&self, series: &EnrichedSeries) -> Result<EntryDecision, DataError> {
        let row = series
            .last_closed_row()
            .ok_or(DataError::InsufficientData {
                required: 2,
                available: series.len(),
            })?;

        let conditions: Vec<(String, bool)> = self
            .conditions
            .iter()
            .map(|c| (c.describe(), c.evaluate(&row)))
            .collect();

        let mut indicators: Vec<(String, Option<f64>)> = Vec::new();
        for label in self.conditions.iter().flat_map(|c| c.labels()) {
            if !indicators.iter().any(|(l, _)| l == label) {
                indicators.push((label.to_string(), row.ma(label)));
            }
        }

        let held = !conditions.is_empty() && conditions.iter().all(|(_, ok)| *ok);
        if self.force {
            warn!(
                row = row.index,
                conditions_held = held,
                "#### FORCING ENTRY: entry rule overridden ####"
            );
        }

        Ok(EntryDecision {
            enter: held || self.force,
            forced: self.force,
            row_index: row.index,
            timestamp: row.candle.timestamp,
            close: row.close(),
            indicators,
            conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{CloseAbove, MaAbove};
    use trading_core::types::Candle;
    use trading_indicators::{enrich, MaType};

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 60, c, c, c, c, 1.0))
            .collect()
    }

    fn windows() -> Vec<WindowSpec> {
        vec![WindowSpec::new(2, "fast"), WindowSpec::new(4, "slow")]
    }

    fn rule() -> EntryRule {
        EntryRule::new(vec![Box::new(MaAbove::new("fast", "slow"))])
    }

    #[test]
    fn test_decision_uses_second_to_last_row() {
        // Falling into the last closed candle, then a huge spike on the live one.
        let series = enrich(candles(&[10.0, 9.0, 8.0, 7.0, 6.0, 1000.0]), &windows(), MaType::Sma);

        let flags = rule().flags(&series);
        assert!(flags[5], "the live row alone would trigger");

        let decision = rule().decide(&series).unwrap();
        assert_eq!(decision.row_index, 4);
        assert_eq!(decision.close, 6.0);
        assert!(!decision.enter);
    }

    #[test]
    fn test_decision_enters_on_rising_closed_candle() {
        let series = enrich(candles(&[1.0, 2.0, 3.0, 4.0, 5.0, 0.1]), &windows(), MaType::Sma);
        let decision = rule().decide(&series).unwrap();

        assert!(decision.enter);
        assert!(!decision.forced);
        assert!((decision.indicator("fast").unwrap() - 4.5).abs() < 1e-10);
        assert!((decision.indicator("slow").unwrap() - 3.5).abs() < 1e-10);
        assert_eq!(decision.conditions, vec![("ma(fast) > ma(slow)".to_string(), true)]);
    }

    #[test]
    fn test_force_sets_every_row() {
        let series = enrich(candles(&[5.0, 4.0, 3.0, 2.0, 1.0]), &windows(), MaType::Sma);
        let forced = rule().with_force(true);

        assert!(forced.flags(&series).iter().all(|f| *f));
        let decision = forced.decide(&series).unwrap();
        assert!(decision.enter);
        assert!(decision.forced);
        assert!(!decision.conditions[0].1);
    }

    #[test]
    fn test_conjunction_requires_all_conditions() {
        // Last closed row: ma(fast) 4.5 > ma(slow) 3.5, but close 4 < ma(fast)
        let series = enrich(candles(&[1.0, 2.0, 3.0, 5.0, 4.0, 4.0]), &windows(), MaType::Sma);
        let one = rule();
        let both = rule().and(Box::new(CloseAbove::new("fast")));

        assert!(one.decide(&series).unwrap().enter);
        assert!(!both.decide(&series).unwrap().enter);
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let series = enrich(candles(&[1.0]), &windows(), MaType::Sma);
        let err = rule().decide(&series).unwrap_err();
        assert!(matches!(
            err,
            DataError::InsufficientData { required: 2, available: 1 }
        ));
    }

    #[test]
    fn test_config_validation() {
        let config = EntryRuleConfig::default();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.conditions = vec![ConditionConfig::MaAbove {
            short: "14m".into(),
            long: "1d".into(),
        }];
        assert!(matches!(bad.validate(), Err(StrategyError::UnknownLabel(l)) if l == "1d"));

        let mut dup = config.clone();
        dup.windows.push(WindowSpec::new(5, "14m"));
        assert!(dup.validate().is_err());

        let mut zero = config;
        zero.windows[0].length = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config: EntryRuleConfig = toml::from_str(
            r#"
            windows = [{ length = 14, label = "14m" }, { length = 720, label = "12h" }]
            conditions = [
                { type = "ma_above", short = "14m", long = "12h" },
                { type = "close_above", label = "14m" },
            ]
            "#,
        )
        .unwrap();

        assert!(!config.force);
        let rule = EntryRule::from_config(&config).unwrap();
        assert!(!rule.is_forced());
    }
}
