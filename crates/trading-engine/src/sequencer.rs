//! Per-cycle order sequencing.
//!
//! Every cycle starts from exchange state alone: the balance, open orders
//! and closed orders are queried fresh and nothing is carried over from the
//! previous cycle.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trading_core::error::{BrokerError, DataError, TradingError, TradingResult};
use trading_core::traits::{Account, MarketData};
use trading_core::types::{Order, OrderRequest, OrderStatus, Side, Timeframe};
use trading_indicators::{enrich, MaType, WindowSpec};
use trading_risk::{price_gap_pct, to_decimal, TakeProfit, UtilizationSizer};
use trading_strategies::{EntryDecision, EntryRule, EntryRuleConfig};

use crate::report::{CycleOutcome, CycleReport, OpenOrderStatus, SequencerState};

/// Per-pair constants for the sequencer.
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    /// Pair symbol, e.g. "XBTUSD"
    pub pair: String,
    /// Currency the balance is held in between trades
    pub base_currency: String,
    /// Currency bought on entry
    pub trade_currency: String,
    pub timeframe: Timeframe,
    pub ma_type: MaType,
    pub windows: Vec<WindowSpec>,
    /// Base balance above which the entry path is taken
    pub funds_threshold: Decimal,
    /// Validate orders with the exchange without placing them
    pub dry_run: bool,
    /// How many of the most recent closed orders to inspect
    pub closed_orders_lookback: usize,
    /// An expiry younger than this many seconds is fresh
    pub expiry_grace_secs: i64,
    pub fill_poll_attempts: u32,
    pub fill_poll_interval: Duration,
    pub sizer: UtilizationSizer,
    pub take_profit: TakeProfit,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            pair: "XBTUSD".to_string(),
            base_currency: "ZUSD".to_string(),
            trade_currency: "XXBT".to_string(),
            timeframe: Timeframe::Minute1,
            ma_type: MaType::Sma,
            windows: EntryRuleConfig::default().windows,
            funds_threshold: dec!(100),
            dry_run: true,
            closed_orders_lookback: 20,
            expiry_grace_secs: 60,
            fill_poll_attempts: 5,
            fill_poll_interval: Duration::from_secs(1),
            sizer: UtilizationSizer::default(),
            take_profit: TakeProfit::default(),
        }
    }
}

/// Records and logs the states a cycle passes through.
struct StateTrace<'a> {
    pair: &'a str,
    path: Vec<SequencerState>,
}

impl<'a> StateTrace<'a> {
    fn new(pair: &'a str) -> Self {
        Self {
            pair,
            path: vec![SequencerState::Idle],
        }
    }

    fn current(&self) -> SequencerState {
        self.path.last().copied().unwrap_or(SequencerState::Idle)
    }

    fn to(&mut self, next: SequencerState) {
        info!(pair = %self.pair, from = %self.current(), to = %next, "State transition");
        self.path.push(next);
    }

    fn into_path(self) -> Vec<SequencerState> {
        self.path
    }
}

fn inconsistent(reason: String) -> TradingError {
    error!("INCONSISTENT STATE: {}", reason);
    TradingError::InconsistentState { reason }
}

/// Runs the buy, take-profit and revert sequence for one pair.
pub struct OrderSequencer {
    settings: SequencerSettings,
    rule: EntryRule,
    market: Arc<dyn MarketData>,
    account: Arc<dyn Account>,
}

impl OrderSequencer {
    pub fn new(
        settings: SequencerSettings,
        rule: EntryRule,
        market: Arc<dyn MarketData>,
        account: Arc<dyn Account>,
    ) -> Self {
        Self {
            settings,
            rule,
            market,
            account,
        }
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    pub fn pair(&self) -> &str {
        &self.settings.pair
    }

    /// Run one cycle as of `now`.
    ///
    /// Errors abort the cycle only. Nothing is retried here; the next
    /// scheduled cycle is the retry.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> TradingResult<CycleReport> {
        let s = &self.settings;
        let mut trace = StateTrace::new(&s.pair);

        let balances = self.account.balances().await?;
        let balance = balances.available(&s.base_currency)?;
        let held = balances.available_or_zero(&s.trade_currency);
        info!(
            currency = %s.base_currency,
            %balance,
            threshold = %s.funds_threshold,
            "Wallet balance"
        );

        let outcome = if balance > s.funds_threshold {
            if held > Decimal::ZERO {
                // Entry does not check whether this balance has a resting take-profit.
                warn!(
                    currency = %s.trade_currency,
                    %held,
                    "Taking the entry path while already holding {}",
                    s.trade_currency
                );
            }
            self.enter(balance, &mut trace).await?
        } else {
            trace.to(SequencerState::Reconciling);
            let outcome = self.reconcile(held, now).await?;
            trace.to(SequencerState::Idle);
            outcome
        };

        Ok(CycleReport {
            pair: s.pair.clone(),
            at: now,
            balance,
            held,
            path: trace.into_path(),
            outcome,
        })
    }

    async fn decide(&self) -> TradingResult<EntryDecision> {
        let s = &self.settings;
        let candles = self.market.candles(&s.pair, s.timeframe).await?;
        if candles.len() < 2 {
            return Err(DataError::InsufficientData {
                required: 2,
                available: candles.len(),
            }
            .into());
        }

        let series = enrich(candles, &s.windows, s.ma_type);
        let decision = self.rule.decide(&series)?;
        for (label, value) in &decision.indicators {
            debug!(row = decision.row_index, %label, ?value, "Indicator");
        }
        for (condition, holds) in &decision.conditions {
            debug!(row = decision.row_index, %condition, holds, "Entry condition");
        }
        Ok(decision)
    }

    async fn enter(
        &self,
        balance: Decimal,
        trace: &mut StateTrace<'_>,
    ) -> TradingResult<CycleOutcome> {
        let s = &self.settings;
        let decision = self.decide().await?;

        if !decision.enter {
            info!(
                row = decision.row_index,
                close = decision.close,
                "We stay put"
            );
            return Ok(CycleOutcome::StayedPut { decision });
        }
        info!(
            row = decision.row_index,
            close = decision.close,
            forced = decision.forced,
            "Enter rule triggered"
        );
        trace.to(SequencerState::EnteringMarket);

        let price = to_decimal(self.market.typical_price(&s.pair, s.timeframe).await?)?;
        let volume = s.sizer.size(balance, price);
        if volume <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected(format!(
                "volume for {} at {} rounds to zero",
                balance, price
            ))
            .into());
        }

        let buy = OrderRequest::market(&s.pair, Side::Buy, volume).validate_only(s.dry_run);
        let ack = self.account.place_order(&buy).await?;
        info!(
            order_id = ack.id().unwrap_or("-"),
            description = %ack.description,
            validate = s.dry_run,
            "Market buy submitted"
        );

        if s.dry_run {
            let limit = s
                .take_profit
                .create_order(&s.pair, volume, price)
                .validate_only(true);
            let limit_ack = self.account.place_order(&limit).await?;
            info!(
                description = %limit_ack.description,
                expiry = %s.take_profit.expiry_secs,
                "Take-profit validated"
            );
            trace.to(SequencerState::Idle);
            return Ok(CycleOutcome::DryRunEntered {
                decision,
                volume,
                reference_price: price,
                limit_price: s.take_profit.limit_price(price),
                buy_description: ack.description,
                limit_description: limit_ack.description,
            });
        }

        let buy_id = ack
            .id()
            .map(str::to_string)
            .ok_or_else(|| BrokerError::ApiError("market buy returned no transaction id".into()))?;

        // From here on the position is open and unprotected until the limit is accepted.
        trace.to(SequencerState::AwaitingFill);
        let (fill_price, executed) = self
            .await_fill(&buy_id, volume)
            .await
            .map_err(|e| unhedged(&buy_id, e))?;
        info!(order_id = %buy_id, %fill_price, volume = %executed, "Market buy filled");

        let limit = s.take_profit.create_order(&s.pair, executed, fill_price);
        let limit_price = s.take_profit.limit_price(fill_price);
        let limit_ack = self
            .account
            .place_order(&limit)
            .await
            .map_err(|e| unhedged(&buy_id, e.into()))?;
        trace.to(SequencerState::LimitPlaced);
        info!(
            order_id = limit_ack.id().unwrap_or("-"),
            description = %limit_ack.description,
            %limit_price,
            "Take-profit placed"
        );

        trace.to(SequencerState::Idle);
        Ok(CycleOutcome::Entered {
            decision,
            buy_id,
            volume: executed,
            fill_price,
            limit_id: limit_ack.id().map(str::to_string),
            limit_price,
        })
    }

    /// Poll the buy until it reports a realised price.
    ///
    /// Returns the fill price and the executed volume.
    async fn await_fill(&self, order_id: &str, requested: Decimal) -> TradingResult<(Decimal, Decimal)> {
        let s = &self.settings;
        for attempt in 1..=s.fill_poll_attempts {
            let order = self.account.order_info(order_id).await?;
            if order.is_filled() {
                if let Some(price) = order.fill_price() {
                    let executed = if order.volume_executed > Decimal::ZERO {
                        order.volume_executed
                    } else {
                        requested
                    };
                    return Ok((price, executed));
                }
            }
            debug!(%order_id, attempt, status = ?order.status, "Waiting for fill");
            if attempt < s.fill_poll_attempts {
                tokio::time::sleep(s.fill_poll_interval).await;
            }
        }
        Err(TradingError::UnhedgedPosition {
            order_id: order_id.to_string(),
            reason: format!("not filled after {} queries", s.fill_poll_attempts),
        })
    }

    async fn reconcile(&self, held: Decimal, now: DateTime<Utc>) -> TradingResult<CycleOutcome> {
        let s = &self.settings;
        let open: Vec<Order> = self
            .account
            .open_orders()
            .await?
            .into_iter()
            .filter(|o| o.pair == s.pair)
            .collect();

        if !open.is_empty() {
            let market_price = self.market.typical_price(&s.pair, s.timeframe).await?;
            let orders: Vec<OpenOrderStatus> = open
                .iter()
                .map(|o| order_status(o, market_price, now))
                .collect();
            for order in &orders {
                info!(
                    order_id = %order.order_id,
                    expiration_mins = ?order.expiration_mins,
                    gap_pct = ?order.gap_pct,
                    "Open order: {}",
                    order.description
                );
            }
            return Ok(CycleOutcome::Monitoring { orders });
        }

        let closed = self.account.closed_orders().await?;
        let expired = closed
            .iter()
            .take(s.closed_orders_lookback)
            .find(|o| o.status == OrderStatus::Expired && o.pair == s.pair);

        let Some(expired) = expired else {
            return Err(inconsistent(format!(
                "no funds, no open orders and no expired order for {} (holding {} {})",
                s.pair, held, s.trade_currency
            )));
        };
        let Some(expiry) = expired.expiry_reference() else {
            return Err(inconsistent(format!(
                "expired order {} reports no expiry time",
                expired.id
            )));
        };

        let age = (now - expiry).num_seconds();
        if age >= s.expiry_grace_secs {
            return Err(inconsistent(format!(
                "no funds and no open orders; last expired order {} lapsed {}s ago (holding {} {})",
                expired.id, age, held, s.trade_currency
            )));
        }

        let volume = held.round_dp_with_strategy(s.sizer.volume_decimals, RoundingStrategy::ToZero);
        if volume <= Decimal::ZERO {
            return Err(inconsistent(format!(
                "order {} expired but there is no {} to sell",
                expired.id, s.trade_currency
            )));
        }

        warn!(
            expired_order = %expired.id,
            age_secs = age,
            %volume,
            "Take-profit expired, reverting to {}",
            s.base_currency
        );
        let sell = OrderRequest::market(&s.pair, Side::Sell, volume).validate_only(s.dry_run);
        let ack = self.account.place_order(&sell).await?;
        info!(
            order_id = ack.id().unwrap_or("-"),
            description = %ack.description,
            "Market sell submitted"
        );

        let sell_price = match ack.id() {
            Some(id) => match self.account.order_info(id).await {
                Ok(order) => order.fill_price(),
                Err(e) => {
                    warn!(order_id = %id, "Could not query revert fill: {}", e);
                    None
                }
            },
            None => None,
        };
        if let Some(price) = sell_price {
            info!(%price, "Reverted at");
        }

        Ok(CycleOutcome::Reverted {
            expired_order_id: expired.id.clone(),
            order_id: ack.id().map(str::to_string),
            volume,
            sell_price,
        })
    }
}

fn unhedged(order_id: &str, err: TradingError) -> TradingError {
    let err = match err {
        TradingError::UnhedgedPosition { .. } => err,
        other => TradingError::UnhedgedPosition {
            order_id: order_id.to_string(),
            reason: other.to_string(),
        },
    };
    error!("UNHEDGED POSITION: {}", err);
    err
}

fn order_status(order: &Order, market_price: f64, now: DateTime<Utc>) -> OpenOrderStatus {
    OpenOrderStatus {
        order_id: order.id.clone(),
        description: order.description.clone(),
        limit_price: order.limit_price,
        expiration_mins: order.seconds_to_expiry(now).map(|secs| secs.div_euclid(60)),
        gap_pct: order
            .limit_price
            .and_then(|p| p.to_f64())
            .and_then(|limit| price_gap_pct(market_price, limit)),
    }
}
