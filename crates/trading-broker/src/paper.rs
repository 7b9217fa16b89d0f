//! In-memory exchange for paper trading and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use trading_core::error::{BrokerError, DataError};
use trading_core::traits::{Account, MarketData};
use trading_core::types::{
    Balances, Candle, Order, OrderAck, OrderRequest, OrderStatus, OrderType, Side, Timeframe,
};
use uuid::Uuid;

/// Closed orders kept, matching one page of the exchange's ClosedOrders.
const CLOSED_HISTORY_LEN: usize = 50;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fixed candle history, replaceable between cycles.
#[derive(Debug, Default)]
pub struct StaticMarketData {
    candles: Mutex<Vec<Candle>>,
}

impl StaticMarketData {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: Mutex::new(candles),
        }
    }

    /// Replace the whole history.
    pub fn set_candles(&self, candles: Vec<Candle>) {
        *lock(&self.candles) = candles;
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn candles(&self, _pair: &str, _timeframe: Timeframe) -> Result<Vec<Candle>, DataError> {
        Ok(lock(&self.candles).clone())
    }

    fn name(&self) -> &str {
        "Static"
    }
}

#[derive(Debug, Default)]
struct PaperState {
    balances: Balances,
    open: Vec<Order>,
    /// Most recent first
    closed: Vec<Order>,
    attempts: Vec<OrderRequest>,
    rejections: Vec<(usize, String)>,
}

impl PaperState {
    fn record_closed(&mut self, order: Order) {
        self.closed.insert(0, order);
        self.closed.truncate(CLOSED_HISTORY_LEN);
    }

    fn find(&self, order_id: &str) -> Option<&Order> {
        self.open
            .iter()
            .chain(self.closed.iter())
            .find(|o| o.id == order_id)
    }
}

/// Paper trading account.
///
/// Market orders fill immediately at the current typical price of the
/// attached market data. Limit orders rest until [`PaperAccount::settle`]
/// fills or expires them. Balances, orders and rejections can be scripted.
pub struct PaperAccount {
    base_currency: String,
    trade_currency: String,
    market: Arc<dyn MarketData>,
    timeframe: Timeframe,
    auto_settle: bool,
    state: Mutex<PaperState>,
}

impl PaperAccount {
    /// Create an empty account trading `trade_currency` against `base_currency`.
    pub fn new(
        base_currency: impl Into<String>,
        trade_currency: impl Into<String>,
        market: Arc<dyn MarketData>,
    ) -> Self {
        Self {
            base_currency: base_currency.into(),
            trade_currency: trade_currency.into(),
            market,
            timeframe: Timeframe::default(),
            auto_settle: false,
            state: Mutex::new(PaperState::default()),
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    /// Settle resting orders against the live price on every balance query.
    pub fn with_auto_settle(mut self, enabled: bool) -> Self {
        self.auto_settle = enabled;
        self
    }

    /// Seed an asset balance.
    pub fn with_balance(self, asset: impl Into<String>, amount: Decimal) -> Self {
        self.set_balance(asset, amount);
        self
    }

    pub fn set_balance(&self, asset: impl Into<String>, amount: Decimal) {
        lock(&self.state).balances.set(asset, amount);
    }

    /// Add an order to the open book.
    pub fn push_open_order(&self, order: Order) {
        lock(&self.state).open.push(order);
    }

    /// Add an order as the most recently closed one.
    pub fn push_closed_order(&self, order: Order) {
        lock(&self.state).record_closed(order);
    }

    /// Reject the next placement attempt with the given exchange message.
    pub fn reject_next(&self, reason: impl Into<String>) {
        let mut state = lock(&self.state);
        let next = state.attempts.len();
        state.rejections.push((next, reason.into()));
    }

    /// Reject the placement attempt with the given zero-based index.
    pub fn reject_attempt(&self, index: usize, reason: impl Into<String>) {
        lock(&self.state).rejections.push((index, reason.into()));
    }

    /// Every placement attempt seen, accepted or not, in order.
    pub fn attempts(&self) -> Vec<OrderRequest> {
        lock(&self.state).attempts.clone()
    }

    /// Balance snapshot without settling.
    pub fn balance_snapshot(&self) -> Balances {
        lock(&self.state).balances.clone()
    }

    /// Fill resting limit orders the market has crossed and expire the
    /// ones past their expiry.
    pub fn settle(&self, market_price: Decimal, now: DateTime<Utc>) {
        let mut state = lock(&self.state);
        let open = std::mem::take(&mut state.open);
        let mut still_open = Vec::with_capacity(open.len());

        for mut order in open {
            let limit = order.limit_price.unwrap_or(market_price);
            let crossed = match order.side {
                Side::Sell => market_price >= limit,
                Side::Buy => market_price <= limit,
            };

            if crossed {
                self.apply_fill(&mut state.balances, order.side, order.volume, limit);
                order.status = OrderStatus::Closed;
                order.volume_executed = order.volume;
                order.avg_price = Some(limit);
                order.closed_at = Some(now);
                info!(order_id = %order.id, price = %limit, "Paper limit order filled");
                state.record_closed(order);
            } else if order.expires_at.is_some_and(|at| at <= now) {
                order.status = OrderStatus::Expired;
                order.closed_at = order.expires_at;
                info!(order_id = %order.id, "Paper order expired");
                state.record_closed(order);
            } else {
                still_open.push(order);
            }
        }

        state.open = still_open;
    }

    fn apply_fill(&self, balances: &mut Balances, side: Side, volume: Decimal, price: Decimal) {
        let cost = volume * price;
        let base = balances.available_or_zero(&self.base_currency);
        let traded = balances.available_or_zero(&self.trade_currency);
        match side {
            Side::Buy => {
                balances.set(self.base_currency.clone(), base - cost);
                balances.set(self.trade_currency.clone(), traded + volume);
            }
            Side::Sell => {
                balances.set(self.base_currency.clone(), base + cost);
                balances.set(self.trade_currency.clone(), traded - volume);
            }
        }
    }

    async fn market_price(&self, pair: &str) -> Result<Decimal, BrokerError> {
        let price = self
            .market
            .typical_price(pair, self.timeframe)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Decimal::from_f64_retain(price)
            .map(|p| p.round_dp(8))
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| BrokerError::ApiError(format!("invalid market price {}", price)))
    }

    fn describe(request: &OrderRequest) -> String {
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => format!(
                "{} {} {} @ limit {}",
                request.side.as_str(),
                request.volume,
                request.pair,
                price
            ),
            _ => format!(
                "{} {} {} @ market",
                request.side.as_str(),
                request.volume,
                request.pair
            ),
        }
    }
}

#[async_trait]
impl Account for PaperAccount {
    async fn balances(&self) -> Result<Balances, BrokerError> {
        if self.auto_settle {
            let pair = lock(&self.state).open.first().map(|o| o.pair.clone());
            if let Some(pair) = pair {
                let price = self.market_price(&pair).await?;
                self.settle(price, Utc::now());
            }
        }
        Ok(lock(&self.state).balances.clone())
    }

    async fn open_orders(&self) -> Result<Vec<Order>, BrokerError> {
        Ok(lock(&self.state).open.clone())
    }

    async fn closed_orders(&self) -> Result<Vec<Order>, BrokerError> {
        Ok(lock(&self.state).closed.clone())
    }

    async fn order_info(&self, order_id: &str) -> Result<Order, BrokerError> {
        lock(&self.state)
            .find(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError> {
        {
            let mut state = lock(&self.state);
            let index = state.attempts.len();
            state.attempts.push(request.clone());
            if let Some(pos) = state.rejections.iter().position(|(i, _)| *i == index) {
                let (_, reason) = state.rejections.remove(pos);
                return Err(BrokerError::OrderRejected(reason));
            }
        }

        if request.volume <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected("EOrder:Invalid volume".into()));
        }

        let description = Self::describe(request);
        if request.validate {
            debug!(%description, "Paper order validated");
            return Ok(OrderAck {
                txids: vec![],
                description,
            });
        }

        let fill_price = match request.order_type {
            OrderType::Market => Some(self.market_price(&request.pair).await?),
            OrderType::Limit => None,
        };

        let now = Utc::now();
        let mut state = lock(&self.state);
        let base = state.balances.available_or_zero(&self.base_currency);
        let traded = state.balances.available_or_zero(&self.trade_currency);
        let required_ok = match (request.side, fill_price) {
            (Side::Buy, Some(price)) => base >= request.volume * price,
            (Side::Buy, None) => request
                .price
                .is_some_and(|limit| base >= request.volume * limit),
            (Side::Sell, _) => traded >= request.volume,
        };
        if !required_ok {
            return Err(BrokerError::OrderRejected("EOrder:Insufficient funds".into()));
        }

        let id = format!("PAPER-{}", Uuid::new_v4().simple());
        let mut order = Order {
            id: id.clone(),
            pair: request.pair.clone(),
            side: request.side,
            order_type: request.order_type,
            volume: request.volume,
            volume_executed: Decimal::ZERO,
            limit_price: request.price,
            avg_price: None,
            status: OrderStatus::Open,
            opened_at: Some(now),
            closed_at: None,
            expires_at: request.expiry.map(|e| e.resolve(now)),
            description: description.clone(),
        };

        match fill_price {
            Some(price) => {
                self.apply_fill(&mut state.balances, request.side, request.volume, price);
                order.status = OrderStatus::Closed;
                order.volume_executed = request.volume;
                order.avg_price = Some(price);
                order.closed_at = Some(now);
                state.record_closed(order);
            }
            None => state.open.push(order),
        }

        info!(order_id = %id, %description, "Paper order placed");
        Ok(OrderAck {
            txids: vec![id],
            description,
        })
    }

    fn name(&self) -> &str {
        "Paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::types::Expiry;

    fn market(price: f64) -> Arc<StaticMarketData> {
        Arc::new(StaticMarketData::new(vec![Candle::new(
            0, price, price, price, price, 1.0,
        )]))
    }

    fn account(price: f64) -> PaperAccount {
        PaperAccount::new("ZUSD", "XXBT", market(price)).with_balance("ZUSD", dec!(1000))
    }

    #[tokio::test]
    async fn test_market_buy_fills_at_typical_price() {
        let account = account(100.0);
        let ack = account
            .place_order(&OrderRequest::market("XBTUSD", Side::Buy, dec!(5)))
            .await
            .unwrap();

        let id = ack.id().unwrap().to_string();
        let order = account.order_info(&id).await.unwrap();
        assert!(order.is_filled());
        assert_eq!(order.fill_price(), Some(dec!(100)));

        let balances = account.balances().await.unwrap();
        assert_eq!(balances.available("ZUSD").unwrap(), dec!(500));
        assert_eq!(balances.available("XXBT").unwrap(), dec!(5));
    }

    #[tokio::test]
    async fn test_validate_only_returns_no_txid() {
        let account = account(100.0);
        let ack = account
            .place_order(&OrderRequest::market("XBTUSD", Side::Buy, dec!(1)).validate_only(true))
            .await
            .unwrap();

        assert!(ack.id().is_none());
        assert_eq!(ack.description, "buy 1 XBTUSD @ market");
        assert_eq!(account.balance_snapshot().available("ZUSD").unwrap(), dec!(1000));
    }

    #[tokio::test]
    async fn test_scripted_rejection() {
        let account = account(100.0);
        account.reject_attempt(1, "EOrder:Insufficient funds");

        let request = OrderRequest::market("XBTUSD", Side::Buy, dec!(1));
        assert!(account.place_order(&request).await.is_ok());
        let err = account.place_order(&request).await.unwrap_err();
        assert!(matches!(err, BrokerError::OrderRejected(_)));
        assert_eq!(account.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let account = account(100.0);
        let err = account
            .place_order(&OrderRequest::market("XBTUSD", Side::Buy, dec!(11)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::OrderRejected(_)));
    }

    #[tokio::test]
    async fn test_limit_order_rests_then_fills_or_expires() {
        let account = account(100.0).with_balance("XXBT", dec!(2));
        let expiring = OrderRequest::limit("XBTUSD", Side::Sell, dec!(1), dec!(110))
            .good_till(Expiry::In(1800));
        let ack = account.place_order(&expiring).await.unwrap();
        let id = ack.id().unwrap().to_string();
        assert_eq!(account.open_orders().await.unwrap().len(), 1);

        // Not crossed, not expired
        let now = Utc::now();
        account.settle(dec!(105), now);
        assert_eq!(account.open_orders().await.unwrap().len(), 1);

        // Expired after 1800s
        account.settle(dec!(105), now + chrono::Duration::seconds(1801));
        let order = account.order_info(&id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Expired);
        assert!(account.open_orders().await.unwrap().is_empty());

        // A second one fills when the market reaches the limit
        account
            .place_order(&OrderRequest::limit("XBTUSD", Side::Sell, dec!(1), dec!(110)))
            .await
            .unwrap();
        account.settle(dec!(111), Utc::now());
        let closed = account.closed_orders().await.unwrap();
        assert_eq!(closed[0].status, OrderStatus::Closed);
        assert_eq!(closed[0].fill_price(), Some(dec!(110)));
        assert_eq!(account.balance_snapshot().available("ZUSD").unwrap(), dec!(1110));
    }

    #[tokio::test]
    async fn test_closed_history_is_bounded() {
        let account = account(100.0);
        let buy = OrderRequest::market("XBTUSD", Side::Buy, dec!(0.1));
        let mut last = String::new();
        for _ in 0..CLOSED_HISTORY_LEN + 5 {
            let ack = account.place_order(&buy).await.unwrap();
            last = ack.id().unwrap().to_string();
        }

        let closed = account.closed_orders().await.unwrap();
        assert_eq!(closed.len(), CLOSED_HISTORY_LEN);
        assert_eq!(closed[0].id, last);
    }
}
