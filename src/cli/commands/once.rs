//! Single cycle command implementation.

use anyhow::Result;
use std::time::Duration;
use trading_config::AppConfig;
use trading_engine::Scheduler;

use super::{alert_sinks, build_sequencer, private_client, sequencer_settings};
use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config: AppConfig) -> Result<()> {
    let client = private_client(&config)?;
    let mut settings = sequencer_settings(&config);
    if args.dry_run {
        settings.dry_run = true;
    }

    let sequencer = build_sequencer(&config, settings, client.clone(), client)?;
    let scheduler = Scheduler::new(sequencer, Duration::from_secs(config.scheduler.interval_secs))
        .with_alerts(alert_sinks(&config));

    let report = scheduler.run_once().await?;
    println!("{}", report.summary());
    Ok(())
}
