//! Live trading command implementation.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use trading_config::AppConfig;
use trading_engine::Scheduler;

use super::{alert_sinks, build_sequencer, private_client, sequencer_settings};
use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config: AppConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let client = private_client(&config)?;
    let mut settings = sequencer_settings(&config);
    if args.dry_run {
        settings.dry_run = true;
    }

    info!(
        pair = %settings.pair,
        dry_run = settings.dry_run,
        interval_secs = config.scheduler.interval_secs,
        "Starting live trading on {}",
        config.exchange.base_url
    );
    if !settings.dry_run {
        warn!("Dry run disabled: orders will be placed for real");
    }

    let sequencer = build_sequencer(&config, settings, client.clone(), client)?;
    let summary = Scheduler::new(sequencer, Duration::from_secs(config.scheduler.interval_secs))
        .with_alerts(alert_sinks(&config))
        .with_shutdown(shutdown)
        .run()
        .await;

    println!(
        "Stopped after {} cycles ({} failed)",
        summary.cycles, summary.failures
    );
    Ok(())
}
