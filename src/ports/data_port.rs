//! Price and indicator source port.

use crate::domain::error::ScantraderError;
use crate::domain::indicator::IndicatorRow;
use crate::domain::price_bar::PriceBar;
use chrono::NaiveDate;

/// Read-only view of the price database.
pub trait DataPort {
    /// Bars for `symbol_id` dated on or after `date_from`, ascending.
    fn fetch_bars(
        &self,
        symbol_id: i64,
        timeframe: &str,
        date_from: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScantraderError>;

    /// Final indicator row for exactly `date`, if one exists.
    fn fetch_indicator_at(
        &self,
        symbol_id: i64,
        timeframe: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorRow>, ScantraderError>;

    fn get_data_range(
        &self,
        symbol_id: i64,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ScantraderError>;
}
