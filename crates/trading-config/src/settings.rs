//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use trading_core::traits::StrategyConfig;
use trading_core::types::Timeframe;
use trading_indicators::{MaType, WindowSpec};
use trading_monitor::LogFormat;
use trading_strategies::{ConditionConfig, EntryRuleConfig};

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Cannot read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub trading: TradingSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub alerts: AlertSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "intraday-trader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Also write to a daily rolling file at this path
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            file: None,
        }
    }
}

/// Exchange connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Environment variable holding the base64 API secret
    pub api_secret_env: String,
    /// File with the API key on the first line and the secret on the second;
    /// takes precedence over the environment variables
    pub key_file: Option<PathBuf>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.kraken.com".to_string(),
            api_key_env: "KRAKEN_API_KEY".to_string(),
            api_secret_env: "KRAKEN_API_SECRET".to_string(),
            key_file: None,
            timeout_secs: 10,
        }
    }
}

/// Pair, sizing and order lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    pub base_currency: String,
    pub trade_currency: String,
    pub pair: String,
    /// Take-profit distance above the fill price, 0.005 = 0.5%
    pub uplift_rate: Decimal,
    /// Take-profit lifetime
    pub gtd_expiry_secs: u64,
    /// Base balance above which an entry is attempted
    pub funds_threshold: Decimal,
    /// Fraction of the base balance spent on entry
    pub utilization_rate: Decimal,
    pub dry_run: bool,
    /// Enter on every cycle regardless of the rule. Debug only.
    pub force_entry: bool,
    pub price_decimals: u32,
    pub volume_decimals: u32,
    pub closed_orders_lookback: usize,
    pub expiry_grace_secs: i64,
    pub fill_poll_attempts: u32,
    pub fill_poll_interval_ms: u64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            base_currency: "ZUSD".to_string(),
            trade_currency: "XXBT".to_string(),
            pair: "XBTUSD".to_string(),
            uplift_rate: dec!(0.005),
            gtd_expiry_secs: 1800,
            funds_threshold: dec!(100),
            utilization_rate: dec!(0.95),
            dry_run: true,
            force_entry: false,
            price_decimals: 1,
            volume_decimals: 8,
            closed_orders_lookback: 20,
            expiry_grace_secs: 60,
            fill_poll_attempts: 5,
            fill_poll_interval_ms: 1000,
        }
    }
}

/// Entry rule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub timeframe: Timeframe,
    pub ma_type: MaType,
    pub windows: Vec<WindowSpec>,
    pub conditions: Vec<ConditionConfig>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        let rule = EntryRuleConfig::default();
        Self {
            timeframe: Timeframe::Minute1,
            ma_type: MaType::Sma,
            windows: rule.windows,
            conditions: rule.conditions,
        }
    }
}

impl StrategySettings {
    /// Entry rule configuration, with the force flag from the trading section.
    pub fn rule_config(&self, force: bool) -> EntryRuleConfig {
        EntryRuleConfig {
            windows: self.windows.clone(),
            conditions: self.conditions.clone(),
            force,
        }
    }
}

/// Loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Operator alerting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Slack or Discord compatible webhook
    pub webhook_url: Option<String>,
}

impl AppConfig {
    /// Check the configuration for values the bot cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let t = &self.trading;
        for (name, value) in [
            ("trading.pair", &t.pair),
            ("trading.base_currency", &t.base_currency),
            ("trading.trade_currency", &t.trade_currency),
        ] {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid(format!("{} must not be empty", name)));
            }
        }
        if t.utilization_rate <= Decimal::ZERO || t.utilization_rate > Decimal::ONE {
            return Err(SettingsError::Invalid(format!(
                "trading.utilization_rate must be in (0, 1], got {}",
                t.utilization_rate
            )));
        }
        if t.uplift_rate <= Decimal::ZERO {
            return Err(SettingsError::Invalid(format!(
                "trading.uplift_rate must be positive, got {}",
                t.uplift_rate
            )));
        }
        if t.funds_threshold < Decimal::ZERO {
            return Err(SettingsError::Invalid(
                "trading.funds_threshold must not be negative".into(),
            ));
        }
        if t.gtd_expiry_secs == 0 {
            return Err(SettingsError::Invalid(
                "trading.gtd_expiry_secs must be greater than 0".into(),
            ));
        }
        if t.closed_orders_lookback == 0 {
            return Err(SettingsError::Invalid(
                "trading.closed_orders_lookback must be greater than 0".into(),
            ));
        }
        if t.expiry_grace_secs <= 0 {
            return Err(SettingsError::Invalid(
                "trading.expiry_grace_secs must be greater than 0".into(),
            ));
        }
        if t.fill_poll_attempts == 0 {
            return Err(SettingsError::Invalid(
                "trading.fill_poll_attempts must be greater than 0".into(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(SettingsError::Invalid(
                "scheduler.interval_secs must be greater than 0".into(),
            ));
        }
        if self.exchange.timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "exchange.timeout_secs must be greater than 0".into(),
            ));
        }

        self.strategy
            .rule_config(t.force_entry)
            .validate()
            .map_err(|e| SettingsError::Invalid(format!("strategy: {}", e)))
    }

    /// Render back to TOML, as resolved after environment overrides.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Invalid(e.to_string()))
    }
}

/// Exchange API credentials, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read the key file if one is configured, else the two environment variables.
    pub fn resolve(exchange: &ExchangeSettings) -> Result<Self, SettingsError> {
        match &exchange.key_file {
            Some(path) => Self::from_key_file(path),
            None => Self::from_env(&exchange.api_key_env, &exchange.api_secret_env),
        }
    }

    pub fn from_key_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next()) {
            (Some(key), Some(secret)) => Ok(Self {
                api_key: key.to_string(),
                api_secret: secret.to_string(),
            }),
            _ => Err(SettingsError::MissingCredentials(format!(
                "{} must hold the API key and secret on two lines",
                path.display()
            ))),
        }
    }

    pub fn from_env(key_var: &str, secret_var: &str) -> Result<Self, SettingsError> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SettingsError::MissingCredentials(format!("{} is not set", var)))
        };
        Ok(Self {
            api_key: read(key_var)?,
            api_secret: read(secret_var)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trading.pair, "XBTUSD");
        assert_eq!(config.strategy.windows.len(), 5);
        assert_eq!(config.scheduler.interval_secs, 60);
    }

    #[test]
    fn test_invalid_utilization() {
        let mut config = AppConfig::default();
        config.trading.utilization_rate = dec!(1.2);
        assert!(matches!(config.validate(), Err(SettingsError::Invalid(_))));

        config.trading.utilization_rate = Decimal::ZERO;
        assert!(config.validate().is_err());

        config.trading.utilization_rate = Decimal::ONE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_scalars() {
        let mut config = AppConfig::default();
        config.trading.uplift_rate = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.trading.pair = " ".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.trading.fill_poll_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_condition_label() {
        let mut config = AppConfig::default();
        config.strategy.conditions = vec![ConditionConfig::CloseAbove {
            label: "4h".into(),
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("4h"));
    }

    #[test]
    fn test_key_file_credentials() {
        let path = std::env::temp_dir().join("intraday-trader-test.key");
        std::fs::write(&path, "my-key\n\nbXktc2VjcmV0\n").unwrap();
        let creds = Credentials::from_key_file(&path).unwrap();
        assert_eq!(creds.api_key, "my-key");
        assert_eq!(creds.api_secret, "bXktc2VjcmV0");
        assert!(!format!("{:?}", creds).contains("bXktc2VjcmV0"));

        std::fs::write(&path, "only-a-key\n").unwrap();
        assert!(matches!(
            Credentials::from_key_file(&path),
            Err(SettingsError::MissingCredentials(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_env_credentials() {
        let exchange = ExchangeSettings {
            api_key_env: "INTRADAY_TRADER_TEST_UNSET_KEY".into(),
            api_secret_env: "INTRADAY_TRADER_TEST_UNSET_SECRET".into(),
            ..ExchangeSettings::default()
        };
        let err = Credentials::resolve(&exchange).unwrap_err();
        assert!(err.to_string().contains("INTRADAY_TRADER_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[trading]"));
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.trading.uplift_rate, dec!(0.005));
        assert_eq!(parsed.strategy.conditions, config.strategy.conditions);
    }
}
