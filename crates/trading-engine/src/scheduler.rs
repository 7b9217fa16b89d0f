//! Fixed-interval cycle loop.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};
use trading_core::error::TradingResult;
use trading_monitor::{Alert, AlertSink};

use crate::report::CycleReport;
use crate::sequencer::OrderSequencer;

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub failures: u64,
}

/// Runs the sequencer once per interval, strictly one cycle at a time.
///
/// A cycle that overruns the interval shortens or removes the following
/// sleep; cycles are never skipped, queued or overlapped. Shutdown is
/// observed between cycles only.
pub struct Scheduler {
    sequencer: OrderSequencer,
    interval: Duration,
    max_cycles: Option<u64>,
    alerts: Vec<Arc<dyn AlertSink>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Scheduler {
    pub fn new(sequencer: OrderSequencer, interval: Duration) -> Self {
        Self {
            sequencer,
            interval,
            max_cycles: None,
            alerts: Vec::new(),
            shutdown: None,
        }
    }

    /// Stop after this many cycles.
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Sinks notified when a cycle needs an operator.
    pub fn with_alerts(mut self, alerts: Vec<Arc<dyn AlertSink>>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Stop once the receiver reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run until shut down or `max_cycles` is reached.
    pub async fn run(mut self) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();
        info!(
            pair = %self.sequencer.pair(),
            interval_secs = self.interval.as_secs_f64(),
            "Scheduler started"
        );

        loop {
            if self.shutdown_requested() {
                info!("Shutdown requested");
                break;
            }

            let started = Instant::now();
            if self.run_once().await.is_err() {
                summary.failures += 1;
            }
            summary.cycles += 1;
            let elapsed = started.elapsed();
            info!("This round took {:.2} seconds", elapsed.as_secs_f64());

            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }

            let pause = self.interval.saturating_sub(elapsed);
            if !self.sleep_or_shutdown(pause).await {
                info!("Shutdown requested");
                break;
            }
        }

        info!(
            cycles = summary.cycles,
            failures = summary.failures,
            "Scheduler stopped"
        );
        summary
    }

    /// Run a single cycle, logging and escalating its failure.
    pub async fn run_once(&self) -> TradingResult<CycleReport> {
        match self.sequencer.run_cycle(Utc::now()).await {
            Ok(report) => {
                info!(outcome = report.outcome.label(), "Cycle complete");
                Ok(report)
            }
            Err(e) => {
                let kind = e.kind();
                if e.requires_operator() {
                    error!(%kind, "Cycle failed: {}", e);
                    let alert = Alert::from_error(self.sequencer.pair(), &e);
                    for sink in &self.alerts {
                        sink.send(&alert).await;
                    }
                } else {
                    warn!(%kind, "Cycle failed: {}", e);
                }
                Err(e)
            }
        }
    }

    /// Sleep for `pause`. Returns false when shutdown was requested meanwhile.
    async fn sleep_or_shutdown(&mut self, pause: Duration) -> bool {
        let Some(rx) = self.shutdown.as_mut() else {
            tokio::time::sleep(pause).await;
            return true;
        };

        let sleep = tokio::time::sleep(pause);
        tokio::pin!(sleep);
        let sender_alive = loop {
            let changed = tokio::select! {
                _ = &mut sleep => None,
                changed = rx.changed() => Some(changed.is_ok()),
            };
            match changed {
                None => return true,
                Some(true) if *rx.borrow() => return false,
                Some(true) => continue,
                Some(false) => break false,
            }
        };

        if !sender_alive {
            // Nobody can ask for shutdown any more.
            self.shutdown = None;
            sleep.await;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use trading_broker::{PaperAccount, StaticMarketData};
    use trading_core::error::BrokerError;
    use trading_core::traits::Account;
    use trading_core::types::{Balances, Candle, Order, OrderAck, OrderRequest, OrderType, Side};
    use trading_indicators::WindowSpec;
    use trading_strategies::{EntryRule, MaAbove};

    use crate::sequencer::SequencerSettings;

    #[derive(Default)]
    struct RecordingSink {
        alerts: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, alert: &Alert) {
            self.alerts.lock().unwrap().push(alert.clone());
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Falling closes: the rule never triggers.
    fn quiet_market() -> Arc<StaticMarketData> {
        let candles = (0..20)
            .map(|i| {
                let c = 140.0 - i as f64;
                Candle::new(i * 60, c, c, c, c, 1.0)
            })
            .collect();
        Arc::new(StaticMarketData::new(candles))
    }

    /// Rising closes: the rule triggers every cycle.
    fn trending_market() -> Arc<StaticMarketData> {
        let candles = (0..20)
            .map(|i| {
                let c = 101.0 + i as f64;
                Candle::new(i * 60, c, c, c, c, 1.0)
            })
            .collect();
        Arc::new(StaticMarketData::new(candles))
    }

    fn settings(dry_run: bool) -> SequencerSettings {
        SequencerSettings {
            windows: vec![WindowSpec::new(3, "fast"), WindowSpec::new(6, "slow")],
            dry_run,
            ..SequencerSettings::default()
        }
    }

    fn rule() -> EntryRule {
        EntryRule::new(vec![Box::new(MaAbove::new("fast", "slow"))])
    }

    fn sequencer(usd: rust_decimal::Decimal) -> OrderSequencer {
        let market = quiet_market();
        let account = Arc::new(
            PaperAccount::new("ZUSD", "XXBT", market.clone()).with_balance("ZUSD", usd),
        );
        OrderSequencer::new(settings(true), rule(), market, account)
    }

    /// Paper account whose balance and order placement calls each take `delay`.
    struct SlowAccount {
        inner: Arc<PaperAccount>,
        delay: Duration,
    }

    #[async_trait]
    impl Account for SlowAccount {
        async fn balances(&self) -> Result<Balances, BrokerError> {
            tokio::time::sleep(self.delay).await;
            self.inner.balances().await
        }

        async fn open_orders(&self) -> Result<Vec<Order>, BrokerError> {
            self.inner.open_orders().await
        }

        async fn closed_orders(&self) -> Result<Vec<Order>, BrokerError> {
            self.inner.closed_orders().await
        }

        async fn order_info(&self, order_id: &str) -> Result<Order, BrokerError> {
            self.inner.order_info(order_id).await
        }

        async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError> {
            tokio::time::sleep(self.delay).await;
            self.inner.place_order(request).await
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn slow_sequencer(
        market: Arc<StaticMarketData>,
        dry_run: bool,
        delay: Duration,
    ) -> (OrderSequencer, Arc<PaperAccount>) {
        let paper = Arc::new(
            PaperAccount::new("ZUSD", "XXBT", market.clone()).with_balance("ZUSD", dec!(150)),
        );
        let account = Arc::new(SlowAccount {
            inner: paper.clone(),
            delay,
        });
        (OrderSequencer::new(settings(dry_run), rule(), market, account), paper)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_max_cycles_on_interval() {
        let started = Instant::now();
        let summary = Scheduler::new(sequencer(dec!(150)), Duration::from_secs(60))
            .with_max_cycles(3)
            .run()
            .await;

        assert_eq!(summary, SchedulerSummary { cycles: 3, failures: 0 });
        // Two sleeps; none after the last cycle.
        assert_eq!(started.elapsed().as_secs(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_sleep() {
        let (tx, rx) = watch::channel(false);
        let scheduler = Scheduler::new(sequencer(dec!(150)), Duration::from_secs(60))
            .with_shutdown(rx)
            .run();

        let handle = tokio::spawn(scheduler);
        tokio::time::sleep(Duration::from_secs(90)).await;
        tx.send(true).unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary.cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycles_run_back_to_back() {
        // Each cycle only reads the balance, which takes longer than the interval.
        let (sequencer, paper) =
            slow_sequencer(quiet_market(), true, Duration::from_secs(40));
        let started = Instant::now();
        let summary = Scheduler::new(sequencer, Duration::from_secs(30))
            .with_max_cycles(3)
            .run()
            .await;

        assert_eq!(summary, SchedulerSummary { cycles: 3, failures: 0 });
        // No sleep between cycles, none skipped.
        assert_eq!(started.elapsed().as_secs(), 120);
        assert!(paper.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_cycle_completes_order_sequence() {
        let (sequencer, paper) =
            slow_sequencer(trending_market(), false, Duration::from_secs(40));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(
            Scheduler::new(sequencer, Duration::from_secs(60))
                .with_shutdown(rx)
                .run(),
        );

        // Still reading the balance of the first cycle.
        tokio::time::sleep(Duration::from_secs(15)).await;
        tx.send(true).unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary, SchedulerSummary { cycles: 1, failures: 0 });

        let attempts = paper.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!((attempts[0].side, attempts[0].order_type), (Side::Buy, OrderType::Market));
        assert_eq!((attempts[1].side, attempts[1].order_type), (Side::Sell, OrderType::Limit));
        assert_eq!(paper.open_orders().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_keeps_running() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let started = Instant::now();
        let summary = Scheduler::new(sequencer(dec!(150)), Duration::from_secs(60))
            .with_shutdown(rx)
            .with_max_cycles(2)
            .run()
            .await;

        assert_eq!(summary.cycles, 2);
        assert_eq!(started.elapsed().as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let sink = Arc::new(RecordingSink::default());
        // No funds, no orders: every cycle is inconsistent.
        let summary = Scheduler::new(sequencer(dec!(50)), Duration::from_secs(60))
            .with_alerts(vec![sink.clone() as Arc<dyn AlertSink>])
            .with_max_cycles(2)
            .run()
            .await;

        assert_eq!(summary, SchedulerSummary { cycles: 2, failures: 2 });
        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, "inconsistent_state");
        assert_eq!(alerts[0].pair, "XBTUSD");
    }

    #[tokio::test]
    async fn test_shutdown_before_first_cycle() {
        let (_tx, rx) = watch::channel(true);
        let summary = Scheduler::new(sequencer(dec!(150)), Duration::from_secs(60))
            .with_shutdown(rx)
            .run()
            .await;
        assert_eq!(summary.cycles, 0);
    }
}
