//! Intraday trading bot CLI.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio::sync::watch;
use tracing::{info, warn};
use trading_config::{load_config, AppConfig};
use trading_monitor::{setup_logging, LogFormat};

/// Flip the returned receiver to `true` on Ctrl-C.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current cycle");
                let _ = tx.send(true);
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = load_config(&cli.config);

    // Setup logging
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| AppConfig::default().logging);
    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or(logging.level);
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        logging.format
    };
    let _guard = setup_logging(&level, format, logging.file.as_deref());

    // Execute command
    if let Commands::ValidateConfig = cli.command {
        return cli::commands::validate::run(&cli.config, loaded).await;
    }

    let config = loaded.with_context(|| format!("loading {}", cli.config.display()))?;
    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, config, shutdown_signal()).await,
        Commands::Once(args) => cli::commands::once::run(args, config).await,
        Commands::Paper(args) => cli::commands::paper::run(args, config, shutdown_signal()).await,
        Commands::ValidateConfig => Ok(()),
    }
}
