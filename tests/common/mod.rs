#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use scantrader::domain::error::ScantraderError;
pub use scantrader::domain::indicator::IndicatorRow;
pub use scantrader::domain::price_bar::PriceBar;
use scantrader::domain::signal::Signal;
use scantrader::ports::data_port::DataPort;
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory price and indicator source keyed by symbol id.
pub struct MockDataPort {
    pub bars: HashMap<i64, Vec<PriceBar>>,
    pub indicators: HashMap<(i64, NaiveDate), IndicatorRow>,
    pub errors: HashMap<i64, String>,
    pub fetches: RefCell<Vec<i64>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            indicators: HashMap::new(),
            errors: HashMap::new(),
            fetches: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol_id: i64, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol_id, bars);
        self
    }

    /// Final ATR row for every listed date.
    pub fn with_atr(mut self, symbol_id: i64, dates: &[NaiveDate], atr: f64) -> Self {
        for &date in dates {
            self.indicators.insert((symbol_id, date), atr_row(date, atr));
        }
        self
    }

    /// Final ATR row for every bar already registered for `symbol_id`.
    pub fn with_atr_everywhere(self, symbol_id: i64, atr: f64) -> Self {
        let dates: Vec<NaiveDate> = self
            .bars
            .get(&symbol_id)
            .map(|bars| bars.iter().map(|b| b.date).collect())
            .unwrap_or_default();
        self.with_atr(symbol_id, &dates, atr)
    }

    pub fn with_error(mut self, symbol_id: i64, reason: &str) -> Self {
        self.errors.insert(symbol_id, reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol_id: i64,
        _timeframe: &str,
        date_from: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScantraderError> {
        self.fetches.borrow_mut().push(symbol_id);
        if let Some(reason) = self.errors.get(&symbol_id) {
            return Err(ScantraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .get(&symbol_id)
            .map(|bars| bars.iter().filter(|b| b.date >= date_from).cloned().collect())
            .unwrap_or_default())
    }

    fn fetch_indicator_at(
        &self,
        symbol_id: i64,
        _timeframe: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorRow>, ScantraderError> {
        Ok(self
            .indicators
            .get(&(symbol_id, date))
            .filter(|row| row.is_final)
            .cloned())
    }

    fn get_data_range(
        &self,
        symbol_id: i64,
        _timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ScantraderError> {
        match self.bars.get(&symbol_id) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(date: &str, open: f64, low: f64, close: f64) -> PriceBar {
    PriceBar {
        date: d(date),
        open,
        high: open.max(close) + 0.5,
        low,
        close,
        volume: 10_000,
        adj_close: close,
    }
}

/// Flat bars at `price` on consecutive calendar days starting at `start`.
pub fn flat_bars(start: &str, count: i64, price: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| {
            let mut bar = make_bar(start, price, price - 1.0, price);
            bar.date += Duration::days(i);
            bar
        })
        .collect()
}

pub fn atr_row(date: NaiveDate, atr: f64) -> IndicatorRow {
    IndicatorRow {
        date,
        atr_14: Some(atr),
        is_final: true,
        ..IndicatorRow::default()
    }
}

pub fn make_signal(symbol_id: i64, symbol: &str, date: &str, source: &str) -> Signal {
    Signal {
        symbol_id,
        symbol: symbol.to_string(),
        signal_date: d(date),
        source: source.to_string(),
    }
}

/// Ten prior bars bottoming at 92, the signal bar on 2025-01-10, entry at
/// 100 on 2025-01-13, then `closes` on the following weekdays.
pub fn entry_scenario(closes: &[f64]) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = (0..10)
        .map(|i| {
            let mut bar = make_bar("2024-12-27", 98.0, 95.0, 98.0);
            bar.date += Duration::days(i);
            if i == 4 {
                bar.low = 92.0;
            }
            bar
        })
        .collect();
    // 2024-12-27 + 9 days = 2025-01-05; the signal bar comes next
    bars.push(make_bar("2025-01-10", 98.0, 96.0, 99.0));
    bars.push(make_bar("2025-01-13", 100.0, 99.0, 101.0));

    let mut date = d("2025-01-14");
    for &close in closes {
        bars.push(PriceBar {
            date,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 10_000,
            adj_close: close,
        });
        date = date.succ_opt().unwrap();
        if date.format("%a").to_string() == "Sat" {
            date += Duration::days(2);
        }
    }
    bars
}
