//! Trade performance statistics and rollups.

use std::collections::BTreeMap;

use super::simulator::{ExitReason, Trade};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub stops: usize,
    pub targets: usize,
    pub eod_exits: usize,
    /// Percentage of winning trades, 0-100.
    pub win_rate: f64,
    pub avg_gain: f64,
    pub max_gain: f64,
    pub max_loss: f64,
    /// Worst peak-to-trough decline of the compounded gain curve, ≤ 0.
    pub max_drawdown: f64,
    pub avg_holding_days: f64,
}

impl Summary {
    /// Summarize filled trades in the order given. Skipped trades are
    /// ignored; with nothing filled every statistic is zero.
    pub fn compute<'a, I>(trades: I) -> Self
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let fills: Vec<_> = trades.into_iter().filter_map(Trade::fill).collect();
        if fills.is_empty() {
            return Summary::default();
        }

        let n = fills.len() as f64;
        let gains: Vec<f64> = fills.iter().map(|f| f.gain_pct).collect();
        let wins = fills.iter().filter(|f| f.win).count();
        let count_reason = |reason: ExitReason| fills.iter().filter(|f| f.exit_reason == reason).count();

        Summary {
            total_trades: fills.len(),
            wins,
            losses: fills.len() - wins,
            stops: count_reason(ExitReason::Stop),
            targets: count_reason(ExitReason::Target),
            eod_exits: count_reason(ExitReason::Eod),
            win_rate: wins as f64 / n * 100.0,
            avg_gain: gains.iter().sum::<f64>() / n,
            max_gain: gains.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            max_loss: gains.iter().copied().fold(f64::INFINITY, f64::min),
            max_drawdown: max_drawdown(&gains),
            avg_holding_days: fills.iter().map(|f| f.holding_days as f64).sum::<f64>() / n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_trades == 0
    }
}

/// Max drawdown (percent, ≤ 0) of the curve `Π(1 + gain/100)`.
pub fn max_drawdown(gains_pct: &[f64]) -> f64 {
    let mut cumulative = 1.0_f64;
    let mut running_max = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for gain in gains_pct {
        cumulative *= 1.0 + gain / 100.0;
        running_max = running_max.max(cumulative);
        if running_max > 0.0 {
            let drawdown = (cumulative - running_max) / running_max * 100.0;
            worst = worst.min(drawdown);
        }
    }

    worst
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub key: String,
    pub summary: Summary,
}

/// Per-symbol statistics, sorted by symbol.
pub fn summarize_by_symbol(trades: &[Trade]) -> Vec<GroupSummary> {
    summarize_by(trades, |t| t.symbol.clone())
}

/// Per-feed statistics, sorted by feed name.
pub fn summarize_by_source(trades: &[Trade]) -> Vec<GroupSummary> {
    summarize_by(trades, |t| t.source.clone())
}

fn summarize_by<F>(trades: &[Trade], key: F) -> Vec<GroupSummary>
where
    F: Fn(&Trade) -> String,
{
    let mut groups: BTreeMap<String, Vec<&Trade>> = BTreeMap::new();
    for trade in trades.iter().filter(|t| !t.is_skipped()) {
        groups.entry(key(trade)).or_default().push(trade);
    }

    groups
        .into_iter()
        .map(|(key, group)| GroupSummary {
            key,
            summary: Summary::compute(group),
        })
        .collect()
}

/// Global, per-symbol and per-feed statistics of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub global: Summary,
    pub by_symbol: Vec<GroupSummary>,
    pub by_source: Vec<GroupSummary>,
}

impl PerformanceReport {
    pub fn from_trades(trades: &[Trade]) -> Self {
        PerformanceReport {
            global: Summary::compute(trades),
            by_symbol: summarize_by_symbol(trades),
            by_source: summarize_by_source(trades),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }
}

/// Filled trades that exited on their stop-loss.
pub fn stop_loss_trades(trades: &[Trade]) -> Vec<&Trade> {
    trades
        .iter()
        .filter(|t| t.fill().is_some_and(|f| f.exit_reason == ExitReason::Stop))
        .collect()
}
