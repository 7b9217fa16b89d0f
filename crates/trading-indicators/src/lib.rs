//! Technical indicators for the entry rule.
//!
//! This crate provides:
//! - Moving averages (SMA, EMA, WMA)
//! - Candle enrichment: one moving-average column per configured window,
//!   aligned row-for-row with the candle series

pub mod enrichment;
pub mod moving_average;

pub use enrichment::{effective_length, enrich, EnrichedRow, EnrichedSeries, WindowSpec};
pub use moving_average::{Ema, MaType, Sma, Wma};
