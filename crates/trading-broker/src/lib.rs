//! Exchange integrations.
//!
//! [`KrakenClient`] talks to the Kraken REST API; [`PaperAccount`] and
//! [`StaticMarketData`] simulate an exchange in memory.

mod auth;
mod kraken;
mod paper;

pub use auth::{encode_form, sign, NonceGenerator};
pub use kraken::{KrakenClient, KrakenConfig, DEFAULT_BASE_URL};
pub use paper::{PaperAccount, StaticMarketData};
