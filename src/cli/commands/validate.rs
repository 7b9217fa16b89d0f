//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use trading_config::{AppConfig, Credentials, SettingsError};

pub async fn run(config_path: &Path, loaded: Result<AppConfig, SettingsError>) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match loaded {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Exchange: {}", config.exchange.base_url);
            println!(
                "Pair: {} ({} -> {})",
                config.trading.pair, config.trading.base_currency, config.trading.trade_currency
            );
            println!("Dry run: {}", config.trading.dry_run);
            println!("Funds threshold: {}", config.trading.funds_threshold);
            println!("Utilization: {}", config.trading.utilization_rate);
            println!(
                "Take-profit: +{}% for {}s",
                config.trading.uplift_rate * rust_decimal::Decimal::ONE_HUNDRED,
                config.trading.gtd_expiry_secs
            );
            println!(
                "Windows: {}",
                config
                    .strategy
                    .windows
                    .iter()
                    .map(|w| format!("{}={}", w.label, w.length))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            match Credentials::resolve(&config.exchange) {
                Ok(_) => println!("Credentials: found"),
                Err(e) => println!("Credentials: {} (only paper mode will work)", e),
            }
            println!();
            println!("{}", config.to_toml()?);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
