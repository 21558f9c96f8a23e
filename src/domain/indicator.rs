//! Precomputed indicator rows read from `equity_indicators`.
//!
//! Indicators are not recomputed here; the price database is the oracle.
//! Only rows flagged `is_final` are ever handed to the simulator.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use super::error::ScantraderError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub atr_14: Option<f64>,
    pub rsi_3: Option<f64>,
    pub rsi_9: Option<f64>,
    pub rsi_14: Option<f64>,
    pub ema_rsi_9_3: Option<f64>,
    pub wma_rsi_9_21: Option<f64>,
    pub is_final: bool,
}

impl IndicatorRow {
    /// ATR(14) if present, finite and positive.
    pub fn atr(&self) -> Option<f64> {
        self.atr_14.filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// Point-in-time indicator access for one symbol.
///
/// Lookups may hit a live data source, so they can fail; an absent row is
/// `Ok(None)`.
pub trait IndicatorLookup {
    fn indicator_at(&self, date: NaiveDate) -> Result<Option<IndicatorRow>, ScantraderError>;
}

impl IndicatorLookup for HashMap<NaiveDate, IndicatorRow> {
    fn indicator_at(&self, date: NaiveDate) -> Result<Option<IndicatorRow>, ScantraderError> {
        Ok(self.get(&date).filter(|row| row.is_final).cloned())
    }
}

impl IndicatorLookup for BTreeMap<NaiveDate, IndicatorRow> {
    fn indicator_at(&self, date: NaiveDate) -> Result<Option<IndicatorRow>, ScantraderError> {
        Ok(self.get(&date).filter(|row| row.is_final).cloned())
    }
}
