//! Headered CSV report writer.

use crate::domain::cohort::CohortRun;
use crate::domain::error::ScantraderError;
use crate::domain::metrics::{PerformanceReport, Summary};
use crate::domain::simulator::{round2, Trade};
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    symbol_id: i64,
    symbol: &'a str,
    source: &'a str,
    signal_date: String,
    signal_candle: Option<String>,
    entry_date: Option<String>,
    entry_price: Option<f64>,
    atr_14: Option<f64>,
    swing_low: Option<f64>,
    stop_loss: Option<f64>,
    target: Option<f64>,
    exit_date: Option<String>,
    exit_price: Option<f64>,
    exit_reason: String,
    gain_pct: Option<f64>,
    win: Option<bool>,
    holding_days: Option<i64>,
    skip_reason: Option<String>,
}

impl TradeRow<'_> {
    const HEADERS: [&'static str; 18] = [
        "symbol_id",
        "symbol",
        "source",
        "signal_date",
        "signal_candle",
        "entry_date",
        "entry_price",
        "atr_14",
        "swing_low",
        "stop_loss",
        "target",
        "exit_date",
        "exit_price",
        "exit_reason",
        "gain_pct",
        "win",
        "holding_days",
        "skip_reason",
    ];
}

impl<'a> From<&'a Trade> for TradeRow<'a> {
    fn from(trade: &'a Trade) -> Self {
        let fill = trade.fill();
        TradeRow {
            symbol_id: trade.symbol_id,
            symbol: &trade.symbol,
            source: &trade.source,
            signal_date: trade.signal_date.to_string(),
            signal_candle: trade.signal_candle.map(|c| c.to_string()),
            entry_date: fill.map(|f| f.entry_date.to_string()),
            entry_price: fill.map(|f| round2(f.entry_price)),
            atr_14: fill.and_then(|f| f.atr_14).map(round2),
            swing_low: fill.and_then(|f| f.swing_low).map(round2),
            stop_loss: fill.and_then(|f| f.stop_loss).map(round2),
            target: fill.map(|f| round2(f.target)),
            exit_date: fill.map(|f| f.exit_date.to_string()),
            exit_price: fill.map(|f| round2(f.exit_price)),
            exit_reason: trade.exit_label(),
            gain_pct: fill.map(|f| f.gain_pct),
            win: fill.map(|f| f.win),
            holding_days: fill.map(|f| f.holding_days),
            skip_reason: trade.skip_reason().map(|r| r.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    scope: &'a str,
    key: &'a str,
    total_trades: usize,
    wins: usize,
    losses: usize,
    stops: usize,
    targets: usize,
    eod_exits: usize,
    win_rate: f64,
    avg_gain: f64,
    max_gain: f64,
    max_loss: f64,
    max_drawdown: f64,
    avg_holding_days: f64,
}

impl<'a> SummaryRow<'a> {
    const HEADERS: [&'static str; 14] = [
        "scope",
        "key",
        "total_trades",
        "wins",
        "losses",
        "stops",
        "targets",
        "eod_exits",
        "win_rate",
        "avg_gain",
        "max_gain",
        "max_loss",
        "max_drawdown",
        "avg_holding_days",
    ];

    fn new(scope: &'a str, key: &'a str, s: &Summary) -> Self {
        SummaryRow {
            scope,
            key,
            total_trades: s.total_trades,
            wins: s.wins,
            losses: s.losses,
            stops: s.stops,
            targets: s.targets,
            eod_exits: s.eod_exits,
            win_rate: round2(s.win_rate),
            avg_gain: round2(s.avg_gain),
            max_gain: round2(s.max_gain),
            max_loss: round2(s.max_loss),
            max_drawdown: round2(s.max_drawdown),
            avg_holding_days: round2(s.avg_holding_days),
        }
    }
}

#[derive(Debug, Serialize)]
struct CohortRow {
    week_start: String,
    trades: usize,
    skipped: usize,
    capital_before: f64,
    capital_per_trade: f64,
    pnl: f64,
    capital_after: f64,
    return_pct: f64,
}

impl CohortRow {
    const HEADERS: [&'static str; 8] = [
        "week_start",
        "trades",
        "skipped",
        "capital_before",
        "capital_per_trade",
        "pnl",
        "capital_after",
        "return_pct",
    ];
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// The header goes out before any row so an empty report still has one.
    fn write_rows<T: Serialize>(
        path: &Path,
        headers: &[&str],
        rows: impl IntoIterator<Item = T>,
    ) -> Result<(), ScantraderError> {
        let report_err = |reason: String| ScantraderError::Report {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| report_err(e.to_string()))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| report_err(e.to_string()))?;
        writer
            .write_record(headers)
            .map_err(|e| report_err(e.to_string()))?;
        for row in rows {
            writer.serialize(row).map_err(|e| report_err(e.to_string()))?;
        }
        writer.flush().map_err(|e| report_err(e.to_string()))
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, trades: &[Trade], path: &Path) -> Result<(), ScantraderError> {
        Self::write_rows(path, &TradeRow::HEADERS, trades.iter().map(TradeRow::from))
    }

    fn write_summaries(
        &self,
        report: &PerformanceReport,
        path: &Path,
    ) -> Result<(), ScantraderError> {
        let global = std::iter::once(SummaryRow::new("global", "ALL", &report.global));
        let by_symbol = report
            .by_symbol
            .iter()
            .map(|g| SummaryRow::new("symbol", &g.key, &g.summary));
        let by_source = report
            .by_source
            .iter()
            .map(|g| SummaryRow::new("feed", &g.key, &g.summary));
        Self::write_rows(path, &SummaryRow::HEADERS, global.chain(by_symbol).chain(by_source))
    }

    fn write_cohorts(&self, run: &CohortRun, path: &Path) -> Result<(), ScantraderError> {
        Self::write_rows(
            path,
            &CohortRow::HEADERS,
            run.cohorts.iter().map(|c| CohortRow {
                week_start: c.week_start.to_string(),
                trades: c.trade_count(),
                skipped: c.skipped,
                capital_before: round2(c.capital_before),
                capital_per_trade: round2(c.capital_per_trade),
                pnl: round2(c.pnl),
                capital_after: round2(c.capital_after),
                return_pct: round2(c.return_pct()),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::CandleType;
    use crate::domain::cohort::compound_week;
    use crate::domain::signal::Signal;
    use crate::domain::simulator::{ExitReason, Fill, SkipReason, TradeOutcome};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn signal() -> Signal {
        Signal {
            symbol_id: 4,
            symbol: "BHP".into(),
            signal_date: d("2025-01-10"),
            source: "WEEKLY".into(),
        }
    }

    fn filled() -> Trade {
        Trade {
            signal_candle: Some(CandleType::Hammer),
            outcome: TradeOutcome::Filled(Fill {
                entry_date: d("2025-01-13"),
                entry_price: 100.0,
                atr_14: Some(5.0),
                swing_low: Some(92.0),
                stop_loss: Some(92.0),
                target: 105.0,
                exit_date: d("2025-01-15"),
                exit_price: 106.0,
                exit_reason: ExitReason::Target,
                gain_pct: 6.0,
                win: true,
                holding_days: 2,
            }),
            ..Trade::skipped(&signal(), SkipReason::NoForwardData)
        }
    }

    #[test]
    fn trades_file_has_header_and_skipped_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("trades.csv");
        let trades = vec![filled(), Trade::skipped(&signal(), SkipReason::MissingAtr)];

        CsvReportAdapter::new().write_trades(&trades, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol_id,symbol,source,signal_date,signal_candle"));
        assert!(lines[1].contains("Hammer"));
        assert!(lines[1].contains("TARGET"));
        assert!(lines[2].contains("SKIPPED"));
        assert!(lines[2].contains("missing ATR(14)"));
    }

    #[test]
    fn summaries_file_has_global_row_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.csv");
        let report = PerformanceReport::from_trades(&[filled()]);

        CsvReportAdapter::new().write_summaries(&report, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("global,ALL,1,1,0"));
        assert!(lines[2].starts_with("symbol,BHP"));
        assert!(lines[3].starts_with("feed,WEEKLY"));
    }

    #[test]
    fn cohorts_file_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weekly.csv");
        let run = CohortRun {
            starting_capital: 1_000.0,
            cohorts: vec![compound_week(1_000.0, d("2025-01-13"), vec![filled()])],
            excluded_week: Some(d("2025-01-20")),
            excluded_signals: 2,
        };

        CsvReportAdapter::new().write_cohorts(&run, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("week_start,trades,skipped,capital_before"));
        assert!(content.contains("2025-01-13,1,0,1000.0,1000.0,60.0,1060.0,6.0"));
    }

    #[test]
    fn empty_reports_still_have_header_line() {
        let dir = TempDir::new().unwrap();
        let weekly = dir.path().join("weekly.csv");
        let trades = dir.path().join("trades.csv");
        let run = CohortRun {
            starting_capital: 1_000.0,
            cohorts: vec![],
            excluded_week: Some(d("2025-01-13")),
            excluded_signals: 3,
        };

        let adapter = CsvReportAdapter::new();
        adapter.write_cohorts(&run, &weekly).unwrap();
        adapter.write_trades(&[], &trades).unwrap();

        let weekly = std::fs::read_to_string(&weekly).unwrap();
        assert_eq!(
            weekly,
            "week_start,trades,skipped,capital_before,capital_per_trade,pnl,capital_after,return_pct\n"
        );
        let trades = std::fs::read_to_string(&trades).unwrap();
        assert_eq!(trades.lines().count(), 1);
        assert!(trades.starts_with("symbol_id,symbol,source,signal_date"));
        assert!(trades.trim_end().ends_with("holding_days,skip_reason"));
    }

    #[test]
    fn unwritable_path_is_report_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("trades.csv");

        let result = CsvReportAdapter::new().write_trades(&[], &path);
        assert!(matches!(result, Err(ScantraderError::Report { .. })));
    }
}
