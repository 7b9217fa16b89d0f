//! Take-profit pricing.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::types::{Expiry, OrderRequest, Side};

/// Places the exit a fixed uplift above the realised entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    /// Fractional uplift over the fill price, 0.005 = 0.5%
    pub uplift: Decimal,
    /// Price precision accepted by the exchange for the pair
    pub price_decimals: u32,
    /// Lifetime of the limit order in seconds
    pub expiry_secs: u64,
}

impl Default for TakeProfit {
    fn default() -> Self {
        Self {
            uplift: dec!(0.005),
            price_decimals: 1,
            expiry_secs: 1800,
        }
    }
}

impl TakeProfit {
    pub fn new(uplift: Decimal, price_decimals: u32, expiry_secs: u64) -> Self {
        Self {
            uplift,
            price_decimals,
            expiry_secs,
        }
    }

    /// Limit price for a position filled at `fill_price`.
    pub fn limit_price(&self, fill_price: Decimal) -> Decimal {
        (fill_price * (Decimal::ONE + self.uplift))
            .round_dp_with_strategy(self.price_decimals, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Good-til-date limit sell closing `volume` bought at `fill_price`.
    pub fn create_order(&self, pair: &str, volume: Decimal, fill_price: Decimal) -> OrderRequest {
        OrderRequest::limit(pair, Side::Sell, volume, self.limit_price(fill_price))
            .good_till(Expiry::In(self.expiry_secs))
    }
}

/// Distance of the market from a limit price, in percent, rounded to 4 places.
///
/// Negative while the market is still below the take-profit.
pub fn price_gap_pct(market_price: f64, limit_price: f64) -> Option<f64> {
    if limit_price <= 0.0 || !market_price.is_finite() {
        return None;
    }
    let gap = (market_price / limit_price - 1.0) * 100.0;
    Some((gap * 10_000.0).round() / 10_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::{OrderType, TimeInForce};

    #[test]
    fn test_limit_price_uplift() {
        let tp = TakeProfit::default();
        // 30000 * 1.005
        assert_eq!(tp.limit_price(dec!(30000)), dec!(30150.0));
        // 30123.45 * 1.005 = 30274.06725
        assert_eq!(tp.limit_price(dec!(30123.45)), dec!(30274.1));
    }

    #[test]
    fn test_create_order_is_gtd_sell() {
        let tp = TakeProfit::new(dec!(0.01), 2, 900);
        let order = tp.create_order("XBTUSD", dec!(0.005), dec!(100));

        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.price, Some(dec!(101.00)));
        assert_eq!(order.volume, dec!(0.005));
        assert_eq!(order.time_in_force, Some(TimeInForce::GTD));
        assert_eq!(order.expiry, Some(Expiry::In(900)));
        assert!(!order.validate);
    }

    #[test]
    fn test_price_gap() {
        // market 99, limit 100: -1%
        assert_eq!(price_gap_pct(99.0, 100.0), Some(-1.0));
        // 30000 / 30150 - 1 = -0.497512...%
        assert_eq!(price_gap_pct(30000.0, 30150.0), Some(-0.4975));
        assert_eq!(price_gap_pct(100.0, 0.0), None);
    }
}
