//! Risk management for the trading bot.
//!
//! Sizes the market buy from the available balance and prices the
//! take-profit limit sell from the realised fill.

mod position_sizer;
mod take_profit;

pub use position_sizer::{to_decimal, UtilizationSizer};
pub use take_profit::{price_gap_pct, TakeProfit};
