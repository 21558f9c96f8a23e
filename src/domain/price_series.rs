//! Per-symbol price series with date lookups.

use crate::domain::price_bar::PriceBar;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol_id: i64,
    pub timeframe: String,
    pub bars: Vec<PriceBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl PriceSeries {
    /// Bars are sorted by date; duplicate dates keep the last row.
    pub fn new(symbol_id: i64, timeframe: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol_id,
            timeframe: timeframe.into(),
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Index of the first bar dated strictly after `date`.
    pub fn first_index_after(&self, date: NaiveDate) -> Option<usize> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        (idx < self.bars.len()).then_some(idx)
    }

    /// Minimum low over the `lookback` bars immediately before `index`.
    /// Fewer bars than `lookback` still count; none at all is `None`.
    pub fn swing_low_before(&self, index: usize, lookback: usize) -> Option<f64> {
        let end = index.min(self.bars.len());
        let start = end.saturating_sub(lookback);
        self.bars[start..end]
            .iter()
            .map(|b| b.low)
            .filter(|v| v.is_finite())
            .reduce(f64::min)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}
