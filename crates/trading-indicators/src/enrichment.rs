//! Candle enrichment: moving-average columns keyed by label.
//!
//! Each configured window adds one column with exactly one entry per candle.
//! Entries before the first complete window are `None`. The exchange serves
//! a bounded history, so a window longer than the history is shortened to
//! `len - 1` candles (the newest candle is still forming and never fills a
//! window on its own).

use serde::{Deserialize, Serialize};
use trading_core::types::{closes, last_closed_index, Candle};

use crate::moving_average::MaType;

/// A moving-average window and the label its column is known by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Requested lookback in candles
    pub length: usize,
    /// Column label, e.g. "14m" or "12h"
    pub label: String,
}

impl WindowSpec {
    pub fn new(length: usize, label: impl Into<String>) -> Self {
        Self {
            length,
            label: label.into(),
        }
    }
}

/// Window length actually used for a series of `series_len` candles.
pub fn effective_length(requested: usize, series_len: usize) -> usize {
    requested.min(series_len.saturating_sub(1))
}

#[derive(Debug, Clone)]
struct Column {
    spec: WindowSpec,
    effective: usize,
    values: Vec<Option<f64>>,
}

/// Candle series plus one moving-average column per window.
#[derive(Debug, Clone)]
pub struct EnrichedSeries {
    candles: Vec<Candle>,
    columns: Vec<Column>,
}

/// View of one row of an enriched series.
#[derive(Debug, Clone, Copy)]
pub struct EnrichedRow<'a> {
    pub index: usize,
    pub candle: &'a Candle,
    series: &'a EnrichedSeries,
}

impl<'a> EnrichedRow<'a> {
    /// Moving average of this row for the given label.
    pub fn ma(&self, label: &str) -> Option<f64> {
        self.series.value(label, self.index)
    }

    pub fn close(&self) -> f64 {
        self.candle.close
    }
}

/// Add one moving-average column per window to an ascending candle series.
pub fn enrich(candles: Vec<Candle>, windows: &[WindowSpec], ma_type: MaType) -> EnrichedSeries {
    let prices = closes(&candles);
    let len = candles.len();

    let columns = windows
        .iter()
        .map(|spec| {
            let effective = effective_length(spec.length, len);
            let mut values: Vec<Option<f64>> = Vec::with_capacity(len);
            let computed = ma_type.calculate(&prices, effective);
            if computed.is_empty() {
                values.resize(len, None);
            } else {
                values.resize(len - computed.len(), None);
                values.extend(computed.into_iter().map(Some));
            }
            Column {
                spec: spec.clone(),
                effective,
                values,
            }
        })
        .collect();

    EnrichedSeries { candles, columns }
}

impl EnrichedSeries {
    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Labels in configuration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.spec.label.as_str())
    }

    fn find(&self, label: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.spec.label == label)
    }

    /// Window length used for a label after capping.
    pub fn effective_length(&self, label: &str) -> Option<usize> {
        self.find(label).map(|c| c.effective)
    }

    /// Whole column for a label.
    pub fn column(&self, label: &str) -> Option<&[Option<f64>]> {
        self.find(label).map(|c| c.values.as_slice())
    }

    /// Single value; `None` for unknown labels, out-of-range rows and warm-up rows.
    pub fn value(&self, label: &str, row: usize) -> Option<f64> {
        self.find(label)?.values.get(row).copied().flatten()
    }

    pub fn row(&self, index: usize) -> Option<EnrichedRow<'_>> {
        self.candles.get(index).map(|candle| EnrichedRow {
            index,
            candle,
            series: self,
        })
    }

    /// Newest fully closed row; the very last row is still in progress.
    pub fn last_closed_row(&self) -> Option<EnrichedRow<'_>> {
        last_closed_index(self.len()).and_then(|i| self.row(i))
    }

    pub fn rows(&self) -> impl Iterator<Item = EnrichedRow<'_>> {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}
