//! Backtest run configuration and orchestration.
//!
//! [`Backtester`] binds the pure simulator to a [`DataPort`]: it fetches
//! each symbol's series once, resolves indicators on demand, and feeds the
//! per-signal and weekly-cohort runs.

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::cohort::{allocate, CohortRun};
use super::error::ScantraderError;
use super::indicator::{IndicatorLookup, IndicatorRow};
use super::price_series::PriceSeries;
use super::signal::{group_by_week, Signal};
use super::simulator::{simulate, SimulationConfig, SkipReason, Trade};
use crate::ports::data_port::DataPort;

pub const DEFAULT_TIMEFRAME: &str = "1d";
pub const DEFAULT_STARTING_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub timeframe: String,
    pub simulation: SimulationConfig,
    pub starting_capital: f64,
}

impl RunConfig {
    /// Calendar days fetched before the earliest signal so the swing-low
    /// window is populated across weekends and holidays.
    pub fn history_margin_days(&self) -> i64 {
        self.simulation.swing_lookback as i64 * 2 + 10
    }
}

/// Indicator lookups answered by the data port for one symbol.
pub struct PortIndicators<'a> {
    pub port: &'a dyn DataPort,
    pub symbol_id: i64,
    pub timeframe: &'a str,
}

impl IndicatorLookup for PortIndicators<'_> {
    fn indicator_at(&self, date: NaiveDate) -> Result<Option<IndicatorRow>, ScantraderError> {
        let row = self
            .port
            .fetch_indicator_at(self.symbol_id, self.timeframe, date)?;
        Ok(row.filter(|r| r.is_final))
    }
}

struct LoadedSeries {
    from: NaiveDate,
    series: PriceSeries,
}

pub struct Backtester<'a> {
    data_port: &'a dyn DataPort,
    config: &'a RunConfig,
    loaded: HashMap<i64, LoadedSeries>,
}

impl<'a> Backtester<'a> {
    pub fn new(data_port: &'a dyn DataPort, config: &'a RunConfig) -> Self {
        Self {
            data_port,
            config,
            loaded: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        self.config
    }

    /// Fetch price series for every symbol in `signals`, reusing anything
    /// already loaded from an early enough date.
    pub fn load_series(&mut self, signals: &[Signal]) -> Result<(), ScantraderError> {
        let mut earliest: BTreeMap<i64, NaiveDate> = BTreeMap::new();
        for signal in signals {
            earliest
                .entry(signal.symbol_id)
                .and_modify(|d| *d = (*d).min(signal.signal_date))
                .or_insert(signal.signal_date);
        }

        let margin = Duration::days(self.config.history_margin_days());
        for (symbol_id, first_signal) in earliest {
            let from = first_signal - margin;
            if self
                .loaded
                .get(&symbol_id)
                .is_some_and(|l| l.from <= from)
            {
                continue;
            }

            let bars = self
                .data_port
                .fetch_bars(symbol_id, &self.config.timeframe, from)?;
            debug!(symbol_id, %from, bars = bars.len(), "loaded price series");
            self.loaded.insert(
                symbol_id,
                LoadedSeries {
                    from,
                    series: PriceSeries::new(symbol_id, self.config.timeframe.clone(), bars),
                },
            );
        }
        Ok(())
    }

    /// Simulate one signal against already loaded data. A symbol with no
    /// loaded series has no forward data.
    pub fn simulate_signal(&self, signal: &Signal) -> Result<Trade, ScantraderError> {
        let Some(loaded) = self.loaded.get(&signal.symbol_id) else {
            return Ok(Trade::skipped(signal, SkipReason::NoForwardData));
        };
        let indicators = PortIndicators {
            port: self.data_port,
            symbol_id: signal.symbol_id,
            timeframe: &self.config.timeframe,
        };
        simulate(signal, &loaded.series, &indicators, &self.config.simulation)
    }

    /// One trade per signal, in input order.
    pub fn run_signals(&mut self, signals: &[Signal]) -> Result<Vec<Trade>, ScantraderError> {
        self.load_series(signals)?;
        let trades = signals
            .iter()
            .map(|s| self.simulate_signal(s))
            .collect::<Result<Vec<_>, _>>()?;

        let skipped = trades.iter().filter(|t| t.is_skipped()).count();
        info!(
            signals = signals.len(),
            filled = trades.len() - skipped,
            skipped,
            "signals simulated"
        );
        Ok(trades)
    }

    /// Weekly cohorts compounded from the configured starting capital.
    pub fn run_weekly(&mut self, signals: &[Signal]) -> Result<CohortRun, ScantraderError> {
        self.load_series(signals)?;
        let weeks = group_by_week(signals);
        info!(weeks = weeks.len(), signals = signals.len(), "grouped signals by week");
        let starting_capital = self.config.starting_capital;
        let this = &*self;
        allocate(&weeks, starting_capital, |s| this.simulate_signal(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_bar::PriceBar;
    use std::cell::RefCell;

    struct CountingPort {
        bars: Vec<PriceBar>,
        fetches: RefCell<Vec<(i64, NaiveDate)>>,
    }

    impl DataPort for CountingPort {
        fn fetch_bars(
            &self,
            symbol_id: i64,
            _timeframe: &str,
            date_from: NaiveDate,
        ) -> Result<Vec<PriceBar>, ScantraderError> {
            self.fetches.borrow_mut().push((symbol_id, date_from));
            Ok(self
                .bars
                .iter()
                .filter(|b| b.date >= date_from)
                .cloned()
                .collect())
        }

        fn fetch_indicator_at(
            &self,
            _symbol_id: i64,
            _timeframe: &str,
            date: NaiveDate,
        ) -> Result<Option<IndicatorRow>, ScantraderError> {
            Ok(Some(IndicatorRow {
                date,
                atr_14: Some(5.0),
                is_final: true,
                ..IndicatorRow::default()
            }))
        }

        fn get_data_range(
            &self,
            _symbol_id: i64,
            _timeframe: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ScantraderError> {
            Ok(None)
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn signal(id: i64, date: &str) -> Signal {
        Signal {
            symbol_id: id,
            symbol: format!("S{id}"),
            signal_date: d(date),
            source: "test".into(),
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            timeframe: DEFAULT_TIMEFRAME.into(),
            simulation: SimulationConfig::new(0.05),
            starting_capital: 1_000.0,
        }
    }

    fn port() -> CountingPort {
        let bars = (0..30)
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    date: d("2025-01-01") + Duration::days(i),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1000,
                    adj_close: close,
                }
            })
            .collect();
        CountingPort {
            bars,
            fetches: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn history_margin_scales_with_lookback() {
        let mut c = config();
        assert_eq!(c.history_margin_days(), 30);
        c.simulation.swing_lookback = 3;
        assert_eq!(c.history_margin_days(), 16);
    }

    #[test]
    fn series_fetched_once_per_symbol_from_earliest_signal() {
        let port = port();
        let config = config();
        let mut bt = Backtester::new(&port, &config);

        bt.load_series(&[signal(1, "2025-01-20"), signal(1, "2025-01-10"), signal(2, "2025-01-15")])
            .unwrap();

        let fetches = port.fetches.borrow();
        assert_eq!(fetches.len(), 2);
        assert!(fetches.contains(&(1, d("2025-01-10") - Duration::days(30))));
        assert!(fetches.contains(&(2, d("2025-01-15") - Duration::days(30))));
    }

    #[test]
    fn reload_only_when_earlier_history_needed() {
        let port = port();
        let config = config();
        let mut bt = Backtester::new(&port, &config);

        bt.load_series(&[signal(1, "2025-01-10")]).unwrap();
        bt.load_series(&[signal(1, "2025-01-12")]).unwrap();
        assert_eq!(port.fetches.borrow().len(), 1);

        bt.load_series(&[signal(1, "2025-01-05")]).unwrap();
        assert_eq!(port.fetches.borrow().len(), 2);
    }

    #[test]
    fn unknown_symbol_is_skipped() {
        let port = port();
        let config = config();
        let bt = Backtester::new(&port, &config);
        let trade = bt.simulate_signal(&signal(9, "2025-01-10")).unwrap();
        assert_eq!(trade.skip_reason(), Some(SkipReason::NoForwardData));
    }

    #[test]
    fn run_signals_keeps_input_order() {
        let port = port();
        let config = config();
        let mut bt = Backtester::new(&port, &config);

        let trades = bt
            .run_signals(&[signal(2, "2025-01-12"), signal(1, "2025-01-05"), signal(1, "2025-01-30")])
            .unwrap();

        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].symbol_id, 2);
        assert_eq!(trades[1].signal_date, d("2025-01-05"));
        // last bar is 2025-01-30, nothing after it
        assert!(trades[2].is_skipped());
    }

    #[test]
    fn run_weekly_compounds_from_configured_capital() {
        let port = port();
        let config = config();
        let mut bt = Backtester::new(&port, &config);

        let run = bt
            .run_weekly(&[signal(1, "2025-01-06"), signal(1, "2025-01-13"), signal(2, "2025-01-20")])
            .unwrap();

        assert_eq!(run.starting_capital, 1_000.0);
        assert_eq!(run.excluded_week, Some(d("2025-01-20")));
        assert_eq!(run.cohorts.len(), 2);
        assert_eq!(run.cohorts[1].capital_before, run.cohorts[0].capital_after);
    }
}
