//! Configuration management.

mod settings;

pub use settings::{
    AlertSettings, AppConfig, AppSettings, Credentials, ExchangeSettings, LoggingConfig,
    SchedulerSettings, SettingsError, StrategySettings, TradingSettings,
};

use config::{Config, Environment, File};
use std::path::Path;

/// Load configuration from file and environment, then validate it.
///
/// `TRADING__<SECTION>__<KEY>` variables override the file, e.g.
/// `TRADING__TRADING__DRY_RUN=false`.
pub fn load_config(path: &Path) -> Result<AppConfig, SettingsError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = config.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
