//! Indicator trait definitions.

/// Trait for technical indicators.
///
/// Indicators process price data and produce derived values
/// useful for trading decisions.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// # Arguments
    /// * `data` - Input data (typically close prices), oldest first
    ///
    /// # Returns
    /// One value per complete window, i.e. `data.len() - period + 1` values,
    /// or nothing when there is not enough data.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Highest close over the window.
    struct RollingMax {
        window: usize,
    }

    impl Indicator for RollingMax {
        type Output = f64;

        fn calculate(&self, data: &[f64]) -> Vec<f64> {
            if self.window == 0 || data.len() < self.window {
                return vec![];
            }
            data.windows(self.window)
                .map(|w| w.iter().copied().fold(f64::MIN, f64::max))
                .collect()
        }

        fn period(&self) -> usize {
            self.window
        }

        fn name(&self) -> &str {
            "rolling_max"
        }
    }

    #[test]
    fn test_one_value_per_complete_window() {
        let max = RollingMax { window: 2 };
        let closes = [30000.0, 30100.0, 29950.0, 30050.0];
        assert_eq!(max.calculate(&closes), vec![30100.0, 30100.0, 30050.0]);
        assert!(max.calculate(&closes[..1]).is_empty());
        assert_eq!(max.period(), 2);
        assert_eq!(max.name(), "rolling_max");
    }
}
