//! Paper trading command implementation.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use trading_broker::PaperAccount;
use trading_config::AppConfig;
use trading_engine::Scheduler;

use super::{alert_sinks, build_sequencer, public_client, sequencer_settings};
use crate::cli::PaperArgs;

pub async fn run(args: PaperArgs, config: AppConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let market = public_client(&config)?;
    let mut settings = sequencer_settings(&config);
    // Orders never leave the process, so there is nothing to validate against.
    settings.dry_run = false;

    let account = Arc::new(
        PaperAccount::new(&settings.base_currency, &settings.trade_currency, market.clone())
            .with_timeframe(settings.timeframe)
            .with_auto_settle(true)
            .with_balance(&settings.base_currency, args.capital),
    );
    info!(
        pair = %settings.pair,
        capital = %args.capital,
        currency = %settings.base_currency,
        "Starting paper trading"
    );

    let sequencer = build_sequencer(&config, settings, market, account.clone())?;
    let mut scheduler =
        Scheduler::new(sequencer, Duration::from_secs(config.scheduler.interval_secs))
            .with_alerts(alert_sinks(&config))
            .with_shutdown(shutdown);
    if let Some(cycles) = args.cycles {
        scheduler = scheduler.with_max_cycles(cycles);
    }
    let summary = scheduler.run().await;

    println!(
        "Stopped after {} cycles ({} failed)",
        summary.cycles, summary.failures
    );
    println!("Final balances:");
    let balances = account.balance_snapshot();
    let mut assets: Vec<_> = balances.iter().collect();
    assets.sort_by(|a, b| a.0.cmp(b.0));
    for (asset, amount) in assets {
        println!("  {:<8} {}", asset, amount);
    }
    Ok(())
}
