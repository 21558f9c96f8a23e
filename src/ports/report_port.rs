//! Report output port.

use std::path::Path;

use crate::domain::cohort::CohortRun;
use crate::domain::error::ScantraderError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::simulator::Trade;

/// Port for writing tabular backtest output. Paths are chosen by the caller.
pub trait ReportPort {
    fn write_trades(&self, trades: &[Trade], path: &Path) -> Result<(), ScantraderError>;

    fn write_summaries(
        &self,
        report: &PerformanceReport,
        path: &Path,
    ) -> Result<(), ScantraderError>;

    fn write_cohorts(&self, run: &CohortRun, path: &Path) -> Result<(), ScantraderError>;
}
