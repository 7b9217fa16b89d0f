//! Market data capability.

use crate::error::DataError;
use crate::types::{latest_typical_price, Candle, Timeframe};
use async_trait::async_trait;

/// Source of candles for a pair.
///
/// Implementations return candles ordered from oldest to newest. The newest
/// candle is the period currently in progress.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the recent candle history.
    ///
    /// # Arguments
    /// * `pair` - The pair to fetch
    /// * `timeframe` - The candle period
    async fn candles(&self, pair: &str, timeframe: Timeframe) -> Result<Vec<Candle>, DataError>;

    /// Most up to date typical price, (high + low + close) / 3 of the newest candle.
    async fn typical_price(&self, pair: &str, timeframe: Timeframe) -> Result<f64, DataError> {
        let candles = self.candles(pair, timeframe).await?;
        latest_typical_price(&candles).ok_or_else(|| DataError::NoDataAvailable(pair.to_string()))
    }

    /// Get the data source name.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCandles(Vec<Candle>);

    #[async_trait]
    impl MarketData for FixedCandles {
        async fn candles(&self, _pair: &str, _timeframe: Timeframe) -> Result<Vec<Candle>, DataError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_typical_price_from_newest_candle() {
        let source = FixedCandles(vec![
            Candle::new(0, 1.0, 1.0, 1.0, 1.0, 0.0),
            Candle::new(60, 100.0, 106.0, 97.0, 103.0, 2.0),
        ]);
        let price = source.typical_price("XBTUSD", Timeframe::Minute1).await.unwrap();
        assert!((price - 102.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn test_typical_price_without_candles() {
        let source = FixedCandles(vec![]);
        let err = source.typical_price("XBTUSD", Timeframe::Minute1).await.unwrap_err();
        assert!(matches!(err, DataError::NoDataAvailable(_)));
    }
}
