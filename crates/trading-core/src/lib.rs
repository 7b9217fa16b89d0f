//! Core types and traits for the trading bot.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Candle, Timeframe)
//! - Order types as reported by the exchange (Order, OrderRequest, OrderAck)
//! - Capability traits for market data and account access
//! - The error taxonomy shared by every other crate

pub mod types;
pub mod traits;
pub mod error;

pub use error::{ErrorKind, TradingError, TradingResult};
pub use types::*;
pub use traits::*;
