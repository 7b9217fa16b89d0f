//! CLI command implementations.

pub mod once;
pub mod paper;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use trading_broker::{KrakenClient, KrakenConfig};
use trading_config::{AppConfig, Credentials};
use trading_core::traits::{Account, MarketData};
use trading_engine::{OrderSequencer, SequencerSettings};
use trading_monitor::{AlertSink, LogAlertSink, WebhookAlertSink};
use trading_risk::{TakeProfit, UtilizationSizer};
use trading_strategies::EntryRule;

/// Sequencer constants from the configuration.
pub fn sequencer_settings(config: &AppConfig) -> SequencerSettings {
    let t = &config.trading;
    SequencerSettings {
        pair: t.pair.clone(),
        base_currency: t.base_currency.clone(),
        trade_currency: t.trade_currency.clone(),
        timeframe: config.strategy.timeframe,
        ma_type: config.strategy.ma_type,
        windows: config.strategy.windows.clone(),
        funds_threshold: t.funds_threshold,
        dry_run: t.dry_run,
        closed_orders_lookback: t.closed_orders_lookback,
        expiry_grace_secs: t.expiry_grace_secs,
        fill_poll_attempts: t.fill_poll_attempts,
        fill_poll_interval: Duration::from_millis(t.fill_poll_interval_ms),
        sizer: UtilizationSizer::new(t.utilization_rate, t.volume_decimals),
        take_profit: TakeProfit::new(t.uplift_rate, t.price_decimals, t.gtd_expiry_secs),
    }
}

pub fn build_sequencer(
    config: &AppConfig,
    settings: SequencerSettings,
    market: Arc<dyn MarketData>,
    account: Arc<dyn Account>,
) -> Result<OrderSequencer> {
    let rule = EntryRule::from_config(&config.strategy.rule_config(config.trading.force_entry))
        .context("building entry rule")?;
    Ok(OrderSequencer::new(settings, rule, market, account))
}

fn kraken_config(config: &AppConfig) -> KrakenConfig {
    KrakenConfig::public(
        config.exchange.base_url.clone(),
        Duration::from_secs(config.exchange.timeout_secs),
    )
}

/// Kraken client for public market data only.
pub fn public_client(config: &AppConfig) -> Result<Arc<KrakenClient>> {
    let client = KrakenClient::new(kraken_config(config)).context("creating Kraken client")?;
    Ok(Arc::new(client))
}

/// Kraken client with the account credentials.
pub fn private_client(config: &AppConfig) -> Result<Arc<KrakenClient>> {
    let creds = Credentials::resolve(&config.exchange)?;
    let client = KrakenClient::new(
        kraken_config(config).with_credentials(creds.api_key, creds.api_secret),
    )
    .context("creating Kraken client")?;
    Ok(Arc::new(client))
}

/// Log sink always; webhook when configured.
pub fn alert_sinks(config: &AppConfig) -> Vec<Arc<dyn AlertSink>> {
    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogAlertSink)];
    if let Some(url) = &config.alerts.webhook_url {
        sinks.push(Arc::new(WebhookAlertSink::new(
            url.clone(),
            Duration::from_secs(config.exchange.timeout_secs),
        )));
    }
    sinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_broker::{PaperAccount, StaticMarketData};

    #[test]
    fn test_sequencer_settings_from_config() {
        let mut config = AppConfig::default();
        config.trading.utilization_rate = dec!(0.8);
        config.trading.fill_poll_interval_ms = 250;

        let settings = sequencer_settings(&config);
        assert_eq!(settings.pair, "XBTUSD");
        assert_eq!(settings.sizer.rate, dec!(0.8));
        assert_eq!(settings.take_profit.expiry_secs, 1800);
        assert_eq!(settings.fill_poll_interval, Duration::from_millis(250));
        assert_eq!(settings.windows.len(), 5);
    }

    #[test]
    fn test_alert_sinks() {
        let mut config = AppConfig::default();
        assert_eq!(alert_sinks(&config).len(), 1);

        config.alerts.webhook_url = Some("https://hooks.example.com/abc".into());
        let sinks = alert_sinks(&config);
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[1].name(), "webhook");
    }

    #[tokio::test]
    async fn test_build_sequencer_with_paper_account() {
        let config = AppConfig::default();
        let market = Arc::new(StaticMarketData::new(vec![]));
        let account = Arc::new(PaperAccount::new("ZUSD", "XXBT", market.clone()));
        let sequencer =
            build_sequencer(&config, sequencer_settings(&config), market, account).unwrap();
        assert_eq!(sequencer.pair(), "XBTUSD");
    }
}
