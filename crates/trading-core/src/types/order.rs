//! Order types and structures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - execute immediately at best available price
    Market,
    /// Limit order - execute at specified price or better
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Time in force for orders. Orders without one rest until canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good til date, expires at the order's expiry
    #[serde(rename = "GTD")]
    GTD,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GTD => "GTD",
        }
    }
}

/// When a good-til-date order stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    /// Seconds after the exchange accepts the order
    In(u64),
    /// Absolute point in time
    At(DateTime<Utc>),
}

impl Expiry {
    /// Resolve to an absolute time, given when the order was accepted.
    pub fn resolve(&self, accepted_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Expiry::In(secs) => accepted_at + chrono::Duration::seconds(*secs as i64),
            Expiry::At(at) => *at,
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::In(secs) => write!(f, "+{}", secs),
            Expiry::At(at) => write!(f, "{}", at.timestamp()),
        }
    }
}

/// Order status as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted but not yet working
    Pending,
    /// Working on the book
    Open,
    /// Completely filled
    Closed,
    /// Canceled before completion
    Canceled,
    /// Reached its good-til-date expiry
    Expired,
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "open" => Ok(OrderStatus::Open),
            "closed" => Ok(OrderStatus::Closed),
            "canceled" => Ok(OrderStatus::Canceled),
            "expired" => Ok(OrderStatus::Expired),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

/// Order request for submitting new orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Pair to trade
    pub pair: String,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Volume in the traded currency
    pub volume: Decimal,
    /// Limit price (for limit orders)
    pub price: Option<Decimal>,
    /// Secondary price, unused by market and plain limit orders
    pub price2: Option<Decimal>,
    /// Time in force, exchange default when unset
    pub time_in_force: Option<TimeInForce>,
    /// Expiry for good-til-date orders
    pub expiry: Option<Expiry>,
    /// Ask the exchange to validate only, without placing
    pub validate: bool,
}

impl OrderRequest {
    /// Create a market order request.
    pub fn market(pair: impl Into<String>, side: Side, volume: Decimal) -> Self {
        Self {
            pair: pair.into(),
            side,
            order_type: OrderType::Market,
            volume,
            price: None,
            price2: None,
            time_in_force: None,
            expiry: None,
            validate: false,
        }
    }

    /// Create a limit order request.
    pub fn limit(pair: impl Into<String>, side: Side, volume: Decimal, price: Decimal) -> Self {
        Self {
            pair: pair.into(),
            side,
            order_type: OrderType::Limit,
            volume,
            price: Some(price),
            price2: None,
            time_in_force: None,
            expiry: None,
            validate: false,
        }
    }

    /// Make the order good-til-date with the given expiry.
    pub fn good_till(mut self, expiry: Expiry) -> Self {
        self.time_in_force = Some(TimeInForce::GTD);
        self.expiry = Some(expiry);
        self
    }

    /// Set the validate-only flag.
    pub fn validate_only(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// What the exchange returns for a placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Transaction ids; empty when the request was validate-only
    pub txids: Vec<String>,
    /// Human readable description, e.g. "buy 0.001 XBTUSD @ market"
    pub description: String,
}

impl OrderAck {
    /// First transaction id, if the order was actually placed.
    pub fn id(&self) -> Option<&str> {
        self.txids.first().map(String::as_str)
    }
}

/// Order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange order id
    pub id: String,
    /// Pair as named in the order description
    pub pair: String,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Requested volume
    pub volume: Decimal,
    /// Volume executed so far
    pub volume_executed: Decimal,
    /// Limit price from the order description
    pub limit_price: Option<Decimal>,
    /// Average realised price of the executed volume
    pub avg_price: Option<Decimal>,
    /// Current status
    pub status: OrderStatus,
    /// When the order was opened
    pub opened_at: Option<DateTime<Utc>>,
    /// When the order was closed
    pub closed_at: Option<DateTime<Utc>>,
    /// Good-til-date expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Human readable description
    pub description: String,
}

impl Order {
    /// Check if the order is completely filled.
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Closed
    }

    /// Realised price, once something has executed.
    pub fn fill_price(&self) -> Option<Decimal> {
        self.avg_price.filter(|p| *p > Decimal::ZERO)
    }

    /// Expiry used to decide how long ago an expired order lapsed.
    pub fn expiry_reference(&self) -> Option<DateTime<Utc>> {
        self.expires_at.or(self.closed_at)
    }

    /// Seconds until expiry, negative once expired.
    pub fn seconds_to_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: "OABC-1".to_string(),
            pair: "XBTUSD".to_string(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            volume: dec!(0.01),
            volume_executed: Decimal::ZERO,
            limit_price: Some(dec!(30150.0)),
            avg_price: Some(Decimal::ZERO),
            status,
            opened_at: DateTime::from_timestamp(1_700_000_000, 0),
            closed_at: None,
            expires_at: DateTime::from_timestamp(1_700_001_800, 0),
            description: "sell 0.01 XBTUSD @ limit 30150.0".to_string(),
        }
    }

    #[test]
    fn test_order_request_market() {
        let request = OrderRequest::market("XBTUSD", Side::Buy, dec!(0.5));
        assert_eq!(request.pair, "XBTUSD");
        assert_eq!(request.side, Side::Buy);
        assert_eq!(request.order_type, OrderType::Market);
        assert!(request.price.is_none());
        assert!(!request.validate);
    }

    #[test]
    fn test_order_request_good_till() {
        let request = OrderRequest::limit("XBTUSD", Side::Sell, dec!(0.5), dec!(30150.0))
            .good_till(Expiry::In(1800))
            .validate_only(true);
        assert_eq!(request.time_in_force, Some(TimeInForce::GTD));
        assert_eq!(request.expiry, Some(Expiry::In(1800)));
        assert!(request.validate);
    }

    #[test]
    fn test_expiry_display_and_resolve() {
        let accepted = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(Expiry::In(1800).to_string(), "+1800");
        assert_eq!(Expiry::In(1800).resolve(accepted).timestamp(), 1_700_001_800);
        assert_eq!(Expiry::At(accepted).to_string(), "1700000000");
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("expired".parse::<OrderStatus>().unwrap(), OrderStatus::Expired);
        assert!("bogus".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_fill_price_ignores_zero() {
        let mut o = order(OrderStatus::Open);
        assert!(o.fill_price().is_none());
        o.avg_price = Some(dec!(30000.5));
        assert_eq!(o.fill_price(), Some(dec!(30000.5)));
    }

    #[test]
    fn test_order_expiry_helpers() {
        let mut o = order(OrderStatus::Open);
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(o.seconds_to_expiry(now), Some(1800));

        o.expires_at = None;
        o.closed_at = DateTime::from_timestamp(1_700_000_500, 0);
        assert_eq!(o.expiry_reference().unwrap().timestamp(), 1_700_000_500);
    }

    #[test]
    fn test_ack_id() {
        let placed = OrderAck {
            txids: vec!["OUF4EM-FRGI2-MQMWZD".to_string()],
            description: "buy 0.001 XBTUSD @ market".to_string(),
        };
        assert_eq!(placed.id(), Some("OUF4EM-FRGI2-MQMWZD"));

        let validated = OrderAck {
            txids: vec![],
            description: "buy 0.001 XBTUSD @ market".to_string(),
        };
        assert!(validated.id().is_none());
    }

    #[test]
    fn test_side_wire_names() {
        assert_eq!(Side::Buy.as_str(), "buy");
        assert_eq!(Side::Sell.as_str(), "sell");
    }
}
