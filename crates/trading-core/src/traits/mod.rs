//! Core traits for the trading bot.

mod account;
mod indicator;
mod market_data;
mod strategy;

pub use account::Account;
pub use indicator::Indicator;
pub use market_data::MarketData;
pub use strategy::StrategyConfig;
