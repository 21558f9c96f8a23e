//! Weekly cohort capital compounding.
//!
//! Signals are grouped by the Monday of their week. Each week's valid trades
//! share the capital carried out of the previous week equally, and the
//! week's profit or loss is folded into the capital handed to the next
//! week. Weeks are processed strictly in ascending order. The latest week
//! in the data is left out as possibly incomplete.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::error::ScantraderError;
use super::signal::Signal;
use super::simulator::{Fill, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyCohort {
    pub week_start: NaiveDate,
    /// Filled trades only.
    pub trades: Vec<Trade>,
    pub skipped: usize,
    pub capital_before: f64,
    pub capital_per_trade: f64,
    pub pnl: f64,
    pub capital_after: f64,
}

impl WeeklyCohort {
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn return_pct(&self) -> f64 {
        if self.capital_before > 0.0 {
            self.pnl / self.capital_before * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CohortRun {
    pub starting_capital: f64,
    pub cohorts: Vec<WeeklyCohort>,
    /// Trailing week left out of compounding, if any signals existed.
    pub excluded_week: Option<NaiveDate>,
    pub excluded_signals: usize,
}

impl CohortRun {
    pub fn final_capital(&self) -> f64 {
        self.cohorts
            .last()
            .map(|c| c.capital_after)
            .unwrap_or(self.starting_capital)
    }

    pub fn total_return_pct(&self) -> f64 {
        if self.starting_capital > 0.0 {
            (self.final_capital() - self.starting_capital) / self.starting_capital * 100.0
        } else {
            0.0
        }
    }

    /// Filled trades of every processed cohort, in processing order.
    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.cohorts.iter().flat_map(|c| c.trades.iter())
    }
}

/// One fold step: split `capital_before` across the filled trades and apply
/// their returns. Skipped trades are counted and dropped.
pub fn compound_week(capital_before: f64, week_start: NaiveDate, trades: Vec<Trade>) -> WeeklyCohort {
    let total = trades.len();
    let filled: Vec<Trade> = trades.into_iter().filter(|t| !t.is_skipped()).collect();
    let skipped = total - filled.len();

    if filled.is_empty() {
        return WeeklyCohort {
            week_start,
            trades: filled,
            skipped,
            capital_before,
            capital_per_trade: 0.0,
            pnl: 0.0,
            capital_after: capital_before,
        };
    }

    let capital_per_trade = capital_before / filled.len() as f64;
    let pnl: f64 = filled
        .iter()
        .filter_map(Trade::fill)
        .map(|fill: &Fill| fill.return_fraction() * capital_per_trade)
        .sum();

    WeeklyCohort {
        week_start,
        trades: filled,
        skipped,
        capital_before,
        capital_per_trade,
        pnl,
        capital_after: capital_before + pnl,
    }
}

/// Resolve and compound every week except the latest one.
///
/// `resolve` turns a signal into a trade (normally [`simulate`] bound to a
/// price source). Any error it returns aborts the run.
///
/// [`simulate`]: super::simulator::simulate
pub fn allocate<F>(
    signals_by_week: &BTreeMap<NaiveDate, Vec<Signal>>,
    starting_capital: f64,
    mut resolve: F,
) -> Result<CohortRun, ScantraderError>
where
    F: FnMut(&Signal) -> Result<Trade, ScantraderError>,
{
    let excluded_week = signals_by_week.keys().next_back().copied();
    let excluded_signals = excluded_week
        .and_then(|w| signals_by_week.get(&w))
        .map_or(0, Vec::len);
    if let Some(week) = excluded_week {
        debug!(%week, signals = excluded_signals, "excluding trailing week");
    }

    let (cohorts, final_capital) = signals_by_week
        .iter()
        .filter(|(week, _)| Some(**week) != excluded_week)
        .try_fold(
            (Vec::new(), starting_capital),
            |(mut cohorts, capital), (week, signals)| {
                let trades = signals
                    .iter()
                    .map(&mut resolve)
                    .collect::<Result<Vec<_>, _>>()?;
                let cohort = compound_week(capital, *week, trades);
                debug!(
                    week = %cohort.week_start,
                    trades = cohort.trade_count(),
                    skipped = cohort.skipped,
                    pnl = cohort.pnl,
                    capital = cohort.capital_after,
                    "cohort compounded"
                );
                let next = cohort.capital_after;
                cohorts.push(cohort);
                Ok::<_, ScantraderError>((cohorts, next))
            },
        )?;

    info!(
        cohorts = cohorts.len(),
        starting_capital,
        final_capital,
        "weekly compounding complete"
    );

    Ok(CohortRun {
        starting_capital,
        cohorts,
        excluded_week,
        excluded_signals,
    })
}
