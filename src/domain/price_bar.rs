//! Daily/weekly/monthly price bar as stored in `equity_price_data`.

use chrono::NaiveDate;

use super::candle::{classify, CandleType};

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub adj_close: f64,
}

impl PriceBar {
    pub fn candle_type(&self) -> CandleType {
        classify(self.open, self.high, self.low, self.close)
    }
}

/// Parse a stored date. Rows written by other tools sometimes carry a time
/// component (`2025-01-13 00:00:00`); only the leading date is kept.
pub fn parse_stored_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    let trimmed = value.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
}
