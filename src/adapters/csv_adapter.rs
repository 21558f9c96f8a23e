//! Scanner CSV signal feeds.
//!
//! Each `*.csv` file in the scanner folder is one feed; its file stem is the
//! `source` of every signal it yields.

use crate::domain::error::ScantraderError;
use crate::domain::price_bar::parse_stored_date;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_port::SignalPort;
use serde::Deserialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const REQUIRED_COLUMNS: [&str; 3] = ["symbol_id", "symbol", "date"];

#[derive(Debug, Deserialize)]
struct SignalRecord {
    symbol_id: String,
    symbol: String,
    date: String,
}

pub struct CsvSignalAdapter {
    folder: PathBuf,
}

impl CsvSignalAdapter {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScantraderError> {
        Ok(Self::new(config.require_string("scanner", "folder")?))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn feed_path(&self, feed: &str) -> PathBuf {
        let lower = self.folder.join(format!("{feed}.csv"));
        let upper = self.folder.join(format!("{feed}.CSV"));
        if !lower.exists() && upper.exists() { upper } else { lower }
    }
}

/// Scanner exports sometimes write ids as floats (`12.0`).
fn parse_symbol_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// Parse one feed. Row numbers in errors count the header as line 1.
pub fn parse_feed<R: Read>(feed: &str, reader: R) -> Result<Vec<Signal>, ScantraderError> {
    let malformed = |reason: String| ScantraderError::MalformedInput {
        feed: feed.to_string(),
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| malformed(format!("unreadable header: {e}")))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(malformed(format!("missing column(s): {}", missing.join(", "))));
    }

    let mut signals = Vec::new();
    for (i, result) in rdr.deserialize::<SignalRecord>().enumerate() {
        let line = i + 2;
        let record = result.map_err(|e| malformed(format!("line {line}: {e}")))?;

        let symbol_id = parse_symbol_id(&record.symbol_id)
            .ok_or_else(|| malformed(format!("line {line}: bad symbol_id '{}'", record.symbol_id)))?;
        if record.symbol.is_empty() {
            return Err(malformed(format!("line {line}: empty symbol")));
        }
        let signal_date = parse_stored_date(&record.date)
            .map_err(|_| malformed(format!("line {line}: bad date '{}'", record.date)))?;

        signals.push(Signal {
            symbol_id,
            symbol: record.symbol,
            signal_date,
            source: feed.to_string(),
        });
    }

    Ok(signals)
}

impl SignalPort for CsvSignalAdapter {
    fn list_feeds(&self) -> Result<Vec<String>, ScantraderError> {
        let mut feeds = Vec::new();
        for entry in fs::read_dir(&self.folder)? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if !path.is_file() || !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                feeds.push(stem.to_string());
            }
        }
        feeds.sort();
        Ok(feeds)
    }

    fn load_feed(&self, feed: &str) -> Result<Vec<Signal>, ScantraderError> {
        let file = fs::File::open(self.feed_path(feed))?;
        parse_feed(feed, file)
    }
}
