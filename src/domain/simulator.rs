//! Single-signal trade simulation.
//!
//! Resolves the entry, stop-loss and target for one scanner signal and walks
//! the price series forward to the first bar that triggers an exit:
//! 1. Entry is the open of the first bar strictly after the signal date.
//! 2. Stop is `min(entry - ATR(14), swing low)` where the swing low is the
//!    minimum low of the `swing_lookback` bars before entry, falling back to
//!    `entry - ATR` when there are none. Without the ATR stop the swing low
//!    alone is used.
//! 3. Target is `entry * (1 + target_pct)`.
//! 4. Each bar from the entry bar onward is checked on its close, stop first.
//!    If nothing triggers the trade exits at the last close of the window.
//!
//! Missing data is an expected outcome and yields a skipped trade.

use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

use super::candle::CandleType;
use super::error::ScantraderError;
use super::indicator::IndicatorLookup;
use super::price_series::PriceSeries;
use super::signal::Signal;

pub const DEFAULT_SWING_LOOKBACK: usize = 10;

/// How far forward the exit walk may look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Walk to the end of the available series.
    Unbounded,
    /// Walk exactly this many bars starting at the entry bar. Signals with
    /// fewer bars available are skipped, never exited early.
    Bars(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Profit target as a fraction of the entry price (0.05 = 5%).
    pub target_pct: f64,
    pub swing_lookback: usize,
    pub use_atr_stop: bool,
    pub horizon: Horizon,
}

impl SimulationConfig {
    /// ATR + swing-low stop over an unbounded window. There is no default
    /// target; callers always choose one.
    pub fn new(target_pct: f64) -> Self {
        SimulationConfig {
            target_pct,
            swing_lookback: DEFAULT_SWING_LOOKBACK,
            use_atr_stop: true,
            horizon: Horizon::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Stop,
    Target,
    Eod,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => f.write_str("STOP"),
            ExitReason::Target => f.write_str("TARGET"),
            ExitReason::Eod => f.write_str("EOD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoForwardData,
    InvalidEntryPrice,
    MissingAtr,
    InsufficientForwardData { needed: usize, available: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoForwardData => f.write_str("no forward data"),
            SkipReason::InvalidEntryPrice => f.write_str("invalid entry price"),
            SkipReason::MissingAtr => f.write_str("missing ATR(14)"),
            SkipReason::InsufficientForwardData { needed, available } => write!(
                f,
                "insufficient forward data ({available} of {needed} bars)"
            ),
        }
    }
}

/// Prices and exit of a trade that was actually entered.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub atr_14: Option<f64>,
    pub swing_low: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub gain_pct: f64,
    pub win: bool,
    pub holding_days: i64,
}

impl Fill {
    /// Unrounded fractional return, used for capital allocation.
    pub fn return_fraction(&self) -> f64 {
        (self.exit_price - self.entry_price) / self.entry_price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Filled(Fill),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol_id: i64,
    pub symbol: String,
    pub signal_date: NaiveDate,
    pub source: String,
    pub signal_candle: Option<CandleType>,
    pub outcome: TradeOutcome,
}

impl Trade {
    pub fn skipped(signal: &Signal, reason: SkipReason) -> Self {
        Trade {
            symbol_id: signal.symbol_id,
            symbol: signal.symbol.clone(),
            signal_date: signal.signal_date,
            source: signal.source.clone(),
            signal_candle: None,
            outcome: TradeOutcome::Skipped(reason),
        }
    }

    pub fn fill(&self) -> Option<&Fill> {
        match &self.outcome {
            TradeOutcome::Filled(fill) => Some(fill),
            TradeOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, TradeOutcome::Skipped(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.outcome {
            TradeOutcome::Skipped(reason) => Some(reason),
            TradeOutcome::Filled(_) => None,
        }
    }

    /// `STOP`, `TARGET`, `EOD` or `SKIPPED`.
    pub fn exit_label(&self) -> String {
        match &self.outcome {
            TradeOutcome::Filled(fill) => fill.exit_reason.to_string(),
            TradeOutcome::Skipped(_) => "SKIPPED".to_string(),
        }
    }
}

/// Percentage gain rounded to two decimals.
pub fn gain_pct(entry_price: f64, exit_price: f64) -> f64 {
    round2((exit_price - entry_price) / entry_price * 100.0)
}

/// Round to two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Simulate one signal against a price series and its indicators.
///
/// Only a failing indicator lookup is an error; every no-data condition is
/// a skipped trade.
pub fn simulate(
    signal: &Signal,
    series: &PriceSeries,
    indicators: &dyn IndicatorLookup,
    config: &SimulationConfig,
) -> Result<Trade, ScantraderError> {
    let signal_candle = series.get_bar(signal.signal_date).map(|b| b.candle_type());
    let skip = |reason: SkipReason| -> Result<Trade, ScantraderError> {
        debug!(
            symbol = %signal.symbol,
            signal_date = %signal.signal_date,
            %reason,
            "trade skipped"
        );
        Ok(Trade {
            signal_candle,
            ..Trade::skipped(signal, reason)
        })
    };

    let Some(entry_idx) = series.first_index_after(signal.signal_date) else {
        return skip(SkipReason::NoForwardData);
    };
    let entry_bar = &series.bars[entry_idx];
    let entry_price = entry_bar.open;
    let entry_date = entry_bar.date;
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return skip(SkipReason::InvalidEntryPrice);
    }

    let atr = if config.use_atr_stop {
        match indicators.indicator_at(entry_date)?.and_then(|row| row.atr()) {
            Some(atr) => Some(atr),
            None => return skip(SkipReason::MissingAtr),
        }
    } else {
        None
    };

    let swing = series.swing_low_before(entry_idx, config.swing_lookback);
    let (swing_low, stop_loss) = match atr {
        Some(atr) => {
            let atr_stop = entry_price - atr;
            let swing_low = swing.unwrap_or(atr_stop);
            (Some(swing_low), Some(atr_stop.min(swing_low)))
        }
        None => (swing, swing),
    };
    let target = entry_price * (1.0 + config.target_pct);

    let forward = &series.bars[entry_idx..];
    let window = match config.horizon {
        Horizon::Unbounded => forward,
        Horizon::Bars(needed) if forward.len() < needed => {
            return skip(SkipReason::InsufficientForwardData {
                needed,
                available: forward.len(),
            });
        }
        Horizon::Bars(needed) => &forward[..needed.max(1)],
    };

    let mut exit = None;
    for bar in window {
        if stop_loss.is_some_and(|stop| bar.close <= stop) {
            exit = Some((bar, ExitReason::Stop));
            break;
        }
        if bar.close >= target {
            exit = Some((bar, ExitReason::Target));
            break;
        }
    }
    let (exit_bar, exit_reason) = match exit {
        Some(hit) => hit,
        // window always holds at least the entry bar
        None => (&window[window.len() - 1], ExitReason::Eod),
    };

    let gain = gain_pct(entry_price, exit_bar.close);
    Ok(Trade {
        symbol_id: signal.symbol_id,
        symbol: signal.symbol.clone(),
        signal_date: signal.signal_date,
        source: signal.source.clone(),
        signal_candle,
        outcome: TradeOutcome::Filled(Fill {
            entry_date,
            entry_price,
            atr_14: atr,
            swing_low,
            stop_loss,
            target,
            exit_date: exit_bar.date,
            exit_price: exit_bar.close,
            exit_reason,
            gain_pct: gain,
            win: gain > 0.0,
            holding_days: (exit_bar.date - entry_date).num_days(),
        }),
    })
}
