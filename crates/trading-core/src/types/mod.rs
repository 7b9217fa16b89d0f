//! Core data types for the trading bot.

mod balance;
mod ohlcv;
mod order;
mod timeframe;

pub use balance::Balances;
pub use ohlcv::{closes, is_ascending, last_closed_index, latest_typical_price, Candle};
pub use order::{Expiry, Order, OrderAck, OrderRequest, OrderStatus, OrderType, Side, TimeInForce};
pub use timeframe::Timeframe;
