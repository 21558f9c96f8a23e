//! CLI definition and dispatch.

use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::adapters::csv_adapter::CsvSignalAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{Backtester, RunConfig, DEFAULT_STARTING_CAPITAL, DEFAULT_TIMEFRAME};
use crate::domain::cohort::CohortRun;
use crate::domain::config_validation::{parse_optional, validate_run_config};
use crate::domain::error::ScantraderError;
use crate::domain::metrics::{stop_loss_trades, PerformanceReport, Summary};
use crate::domain::signal::Signal;
use crate::domain::simulator::{Horizon, SimulationConfig, Trade, DEFAULT_SWING_LOOKBACK};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::signal_port::SignalPort;

#[derive(Parser, Debug)]
#[command(name = "scantrader", about = "Scanner signal trade simulator and weekly backtester")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate every signal of one feed, or of all feeds
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Feed name (CSV file stem in the scanner folder)
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        feed: Option<String>,
        #[arg(long)]
        all: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override a config value, e.g. --set simulation.target_pct=0.1
        #[arg(long = "set", value_name = "SECTION.KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Compound weekly cohorts of signals from a starting capital
    Weekly {
        #[arg(short, long)]
        config: PathBuf,
        /// Feed name; all feeds when omitted
        #[arg(long)]
        feed: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long = "set", value_name = "SECTION.KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Validate a configuration file without touching any data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long = "set", value_name = "SECTION.KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Show the stored data range of a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol_id: i64,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Create the SQLite price database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging already initialised: {e}");
    }
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Backtest {
            config,
            feed,
            all: _,
            output,
            overrides,
        } => run_backtest(&config, feed.as_deref(), output.as_deref(), &overrides),
        Command::Weekly {
            config,
            feed,
            output,
            overrides,
        } => run_weekly(&config, feed.as_deref(), output.as_deref(), &overrides),
        Command::Validate { config, overrides } => run_validate(&config, &overrides),
        Command::Info {
            config,
            symbol_id,
            timeframe,
        } => run_info(&config, symbol_id, timeframe.as_deref()),
        Command::InitDb { config } => run_init_db(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}

/// Log the fatal cause and map it to the process exit code.
fn report_failure(e: &ScantraderError) -> ExitCode {
    error!(%e, "run failed");
    eprintln!("error: {e}");
    e.into()
}

pub fn load_config<S: AsRef<str>>(
    path: &Path,
    overrides: &[S],
) -> Result<FileConfigAdapter, ScantraderError> {
    eprintln!("Loading config from {}", path.display());
    let mut adapter = FileConfigAdapter::from_file(path)?;
    adapter.apply_overrides(overrides)?;
    Ok(adapter)
}

/// Typed run settings. Call [`validate_run_config`] first; this only
/// applies defaults.
pub fn build_run_config(config: &dyn ConfigPort) -> Result<RunConfig, ScantraderError> {
    let target_pct = parse_optional::<f64>(config, "simulation", "target_pct")?.ok_or_else(|| {
        ScantraderError::ConfigMissing {
            section: "simulation".into(),
            key: "target_pct".into(),
        }
    })?;

    let swing_lookback = parse_optional::<usize>(config, "simulation", "swing_lookback")?
        .unwrap_or(DEFAULT_SWING_LOOKBACK);
    let horizon = match parse_optional::<usize>(config, "simulation", "forward_days")? {
        None | Some(0) => Horizon::Unbounded,
        Some(n) => Horizon::Bars(n),
    };

    Ok(RunConfig {
        timeframe: config
            .get_string("simulation", "timeframe")
            .map(|tf| tf.trim().to_string())
            .filter(|tf| !tf.is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string()),
        simulation: SimulationConfig {
            target_pct,
            swing_lookback,
            use_atr_stop: config.get_bool("simulation", "use_atr_stop", true),
            horizon,
        },
        starting_capital: config.get_double("weekly", "starting_capital", DEFAULT_STARTING_CAPITAL),
    })
}

/// SQLite when `[sqlite] path` is set, otherwise PostgreSQL.
pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, ScantraderError> {
    let has_sqlite_path = config
        .get_string("sqlite", "path")
        .is_some_and(|p| !p.trim().is_empty());

    match has_sqlite_path {
        #[cfg(feature = "sqlite")]
        true => {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            Ok(Box::new(adapter))
        }
        #[cfg(feature = "postgres")]
        false => {
            let adapter = crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?;
            Ok(Box::new(adapter))
        }
        #[allow(unreachable_patterns)]
        _ => Err(ScantraderError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        }),
    }
}

/// Signals gathered from one or more feeds.
#[derive(Debug, Default)]
pub struct SignalBatch {
    pub feeds: Vec<String>,
    /// Feeds dropped as malformed.
    pub rejected: Vec<String>,
    pub signals: Vec<Signal>,
}

/// Load the named feed, or every feed when `feed` is `None`.
///
/// A malformed feed is logged and skipped. If every requested feed is
/// malformed the first error is returned.
pub fn load_signals(
    port: &dyn SignalPort,
    feed: Option<&str>,
    folder: &str,
) -> Result<SignalBatch, ScantraderError> {
    let feeds = match feed {
        Some(name) => vec![name.trim_end_matches(".csv").to_string()],
        None => port.list_feeds()?,
    };
    if feeds.is_empty() {
        return Err(ScantraderError::NoFeeds {
            folder: folder.to_string(),
        });
    }

    let mut batch = SignalBatch::default();
    let mut first_error = None;
    for name in feeds {
        match port.load_feed(&name) {
            Ok(signals) => {
                info!(feed = %name, signals = signals.len(), "loaded feed");
                batch.signals.extend(signals);
            }
            Err(e @ ScantraderError::MalformedInput { .. }) => {
                warn!(feed = %name, error = %e, "skipping malformed feed");
                batch.rejected.push(name.clone());
                first_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
        batch.feeds.push(name);
    }

    match first_error {
        Some(e) if batch.rejected.len() == batch.feeds.len() => Err(e),
        _ => Ok(batch),
    }
}

pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn report_path(output_dir: &Path, kind: &str, stamp: &str) -> PathBuf {
    output_dir.join(format!("{kind}_{stamp}.csv"))
}

#[derive(Debug)]
pub struct BacktestOutput {
    pub trades: Vec<Trade>,
    pub report: PerformanceReport,
    pub files: Vec<PathBuf>,
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    run_config: &RunConfig,
    signals: &[Signal],
    output_dir: &Path,
    stamp: &str,
) -> Result<BacktestOutput, ScantraderError> {
    let mut backtester = Backtester::new(data_port, run_config);
    let trades = backtester.run_signals(signals)?;
    let report = PerformanceReport::from_trades(&trades);

    let trades_path = report_path(output_dir, "trades", stamp);
    let summary_path = report_path(output_dir, "summary", stamp);
    report_port.write_trades(&trades, &trades_path)?;
    report_port.write_summaries(&report, &summary_path)?;

    Ok(BacktestOutput {
        trades,
        report,
        files: vec![trades_path, summary_path],
    })
}

#[derive(Debug)]
pub struct WeeklyOutput {
    pub run: CohortRun,
    pub report: PerformanceReport,
    pub files: Vec<PathBuf>,
}

pub fn run_weekly_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    run_config: &RunConfig,
    signals: &[Signal],
    output_dir: &Path,
    stamp: &str,
) -> Result<WeeklyOutput, ScantraderError> {
    let mut backtester = Backtester::new(data_port, run_config);
    let run = backtester.run_weekly(signals)?;
    let trades: Vec<Trade> = run.trades().cloned().collect();
    let report = PerformanceReport::from_trades(&trades);

    let weekly_path = report_path(output_dir, "weekly", stamp);
    let trades_path = report_path(output_dir, "weekly_trades", stamp);
    report_port.write_cohorts(&run, &weekly_path)?;
    report_port.write_trades(&trades, &trades_path)?;

    Ok(WeeklyOutput {
        run,
        report,
        files: vec![weekly_path, trades_path],
    })
}

struct Session {
    config: FileConfigAdapter,
    run_config: RunConfig,
    output_dir: PathBuf,
}

fn prepare<S: AsRef<str>>(
    config_path: &Path,
    output: Option<&Path>,
    overrides: &[S],
) -> Result<Session, ScantraderError> {
    let config = load_config(config_path, overrides)?;
    validate_run_config(&config)?;
    let run_config = build_run_config(&config)?;
    let output_dir = output.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(
            config
                .get_string("report", "output_dir")
                .unwrap_or_else(|| ".".to_string()),
        )
    });
    Ok(Session {
        config,
        run_config,
        output_dir,
    })
}

fn load_session_signals(
    session: &Session,
    feed: Option<&str>,
) -> Result<SignalBatch, ScantraderError> {
    let signal_port = CsvSignalAdapter::from_config(&session.config)?;
    let folder = signal_port.folder().display().to_string();
    let batch = load_signals(&signal_port, feed, &folder)?;
    eprintln!(
        "Loaded {} signals from {} feed(s){}",
        batch.signals.len(),
        batch.feeds.len(),
        if batch.rejected.is_empty() {
            String::new()
        } else {
            format!(" ({} rejected: {})", batch.rejected.len(), batch.rejected.join(", "))
        }
    );
    Ok(batch)
}

fn run_backtest<S: AsRef<str>>(
    config_path: &Path,
    feed: Option<&str>,
    output: Option<&Path>,
    overrides: &[S],
) -> Result<(), ScantraderError> {
    let session = prepare(config_path, output, overrides)?;
    let batch = load_session_signals(&session, feed)?;
    let data_port = open_data_port(&session.config)?;

    let result = run_backtest_pipeline(
        data_port.as_ref(),
        &CsvReportAdapter::new(),
        &session.run_config,
        &batch.signals,
        &session.output_dir,
        &timestamp(),
    )?;

    print_backtest_summary(&result);
    for path in &result.files {
        eprintln!("Report written to: {}", path.display());
    }
    Ok(())
}

fn run_weekly<S: AsRef<str>>(
    config_path: &Path,
    feed: Option<&str>,
    output: Option<&Path>,
    overrides: &[S],
) -> Result<(), ScantraderError> {
    let session = prepare(config_path, output, overrides)?;
    let batch = load_session_signals(&session, feed)?;
    let data_port = open_data_port(&session.config)?;

    let result = run_weekly_pipeline(
        data_port.as_ref(),
        &CsvReportAdapter::new(),
        &session.run_config,
        &batch.signals,
        &session.output_dir,
        &timestamp(),
    )?;

    print_weekly_summary(&result);
    for path in &result.files {
        eprintln!("Report written to: {}", path.display());
    }
    Ok(())
}

fn print_summary_block(summary: &Summary) {
    eprintln!("Total Trades:     {}", summary.total_trades);
    eprintln!(
        "Win Rate:         {:.1}% ({} wins / {} losses)",
        summary.win_rate, summary.wins, summary.losses
    );
    eprintln!("Avg Gain:         {:.2}%", summary.avg_gain);
    eprintln!("Max Gain:         {:.2}%", summary.max_gain);
    eprintln!("Max Loss:         {:.2}%", summary.max_loss);
    eprintln!("Max Drawdown:     {:.2}%", summary.max_drawdown);
    eprintln!("Avg Holding Days: {:.1}", summary.avg_holding_days);
    eprintln!(
        "Exits:            {} TARGET, {} STOP, {} EOD",
        summary.targets, summary.stops, summary.eod_exits
    );
}

pub fn print_backtest_summary(output: &BacktestOutput) {
    let skipped = output.trades.iter().filter(|t| t.is_skipped()).count();

    eprintln!("\n=== Backtest Results ===");
    eprintln!("Signals:          {}", output.trades.len());
    eprintln!("Skipped:          {}", skipped);
    if output.report.is_empty() {
        eprintln!("No valid trades.");
        return;
    }
    print_summary_block(&output.report.global);

    if output.report.by_source.len() > 1 {
        eprintln!("\n=== Per-Feed Summary ===");
        for group in &output.report.by_source {
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, avg {:.2}%",
                group.key, group.summary.total_trades, group.summary.win_rate, group.summary.avg_gain
            );
        }
    }

    let stops = stop_loss_trades(&output.trades);
    eprintln!("\n=== Stop-Loss Trades ({}) ===", stops.len());
    for trade in stops {
        if let Some(fill) = trade.fill() {
            eprintln!(
                "  {} [{}] signal {}  entry {} @ {:.2}  exit {} @ {:.2}  {:+.2}%",
                trade.symbol,
                trade.source,
                trade.signal_date,
                fill.entry_date,
                fill.entry_price,
                fill.exit_date,
                fill.exit_price,
                fill.gain_pct
            );
        }
    }
}

pub fn print_weekly_summary(output: &WeeklyOutput) {
    let run = &output.run;
    eprintln!("\n=== Weekly Compounding ===");
    eprintln!("Starting Capital: {:.2}", run.starting_capital);
    eprintln!("Weeks Compounded: {}", run.cohorts.len());
    if let Some(week) = run.excluded_week {
        eprintln!(
            "Excluded Week:    {} ({} signals, possibly incomplete)",
            week, run.excluded_signals
        );
    }
    for cohort in &run.cohorts {
        eprintln!(
            "  {}:  {} trades, {:.2} -> {:.2} ({:+.2}%)",
            cohort.week_start,
            cohort.trade_count(),
            cohort.capital_before,
            cohort.capital_after,
            cohort.return_pct()
        );
    }
    eprintln!("Final Capital:    {:.2}", run.final_capital());
    eprintln!("Total Return:     {:+.2}%", run.total_return_pct());

    if !output.report.is_empty() {
        eprintln!();
        print_summary_block(&output.report.global);
    }
}

fn run_validate<S: AsRef<str>>(config_path: &Path, overrides: &[S]) -> Result<(), ScantraderError> {
    let config = load_config(config_path, overrides)?;
    validate_run_config(&config)?;
    let run_config = build_run_config(&config)?;
    let sim = &run_config.simulation;

    eprintln!("\nSimulation:");
    eprintln!("  target_pct:      {}", sim.target_pct);
    eprintln!("  swing_lookback:  {}", sim.swing_lookback);
    eprintln!("  use_atr_stop:    {}", sim.use_atr_stop);
    match sim.horizon {
        Horizon::Unbounded => eprintln!("  forward window:  unbounded"),
        Horizon::Bars(n) => eprintln!("  forward window:  {n} bars"),
    }
    eprintln!("  timeframe:       {}", run_config.timeframe);
    eprintln!("Weekly:");
    eprintln!("  starting_capital: {:.2}", run_config.starting_capital);

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(config_path: &Path, symbol_id: i64, timeframe: Option<&str>) -> Result<(), ScantraderError> {
    let config = load_config::<&str>(config_path, &[])?;
    let timeframe = timeframe
        .map(str::to_string)
        .or_else(|| config.get_string("simulation", "timeframe"))
        .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string());
    let data_port = open_data_port(&config)?;

    match data_port.get_data_range(symbol_id, &timeframe)? {
        Some((first, last, count)) => {
            println!("{symbol_id} ({timeframe}): {count} bars, {first} to {last}");
        }
        None => eprintln!("{symbol_id} ({timeframe}): no data found"),
    }
    Ok(())
}

fn run_init_db(config_path: &Path) -> Result<(), ScantraderError> {
    let config = load_config::<&str>(config_path, &[])?;

    #[cfg(feature = "sqlite")]
    {
        let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(&config)?;
        adapter.initialize_schema()?;
        eprintln!("Schema initialised.");
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Err(ScantraderError::ConfigInvalid {
            section: "sqlite".into(),
            key: "path".into(),
            reason: "sqlite feature is required for init-db".into(),
        })
    }
}
