//! Domain error types.
//!
//! Expected no-data outcomes (no forward bar, missing ATR, short forward
//! window) are not errors; they are recorded as [`SkipReason`] values on the
//! trade. Everything here aborts either a single feed or the whole run.
//!
//! [`SkipReason`]: crate::domain::simulator::SkipReason

/// Top-level error type for scantrader.
#[derive(Debug, thiserror::Error)]
pub enum ScantraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("malformed signal feed {feed}: {reason}")]
    MalformedInput { feed: String, reason: String },

    #[error("no signal feeds found in {folder}")]
    NoFeeds { folder: String },

    #[error("failed to write report {path}: {reason}")]
    Report { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScantraderError {
    /// True for failures of the price/indicator source. These end the run.
    pub fn is_data_source(&self) -> bool {
        matches!(
            self,
            ScantraderError::Database { .. } | ScantraderError::DatabaseQuery { .. }
        )
    }
}

impl From<&ScantraderError> for std::process::ExitCode {
    fn from(err: &ScantraderError) -> Self {
        let code: u8 = match err {
            ScantraderError::Io(_) | ScantraderError::Report { .. } => 1,
            ScantraderError::ConfigParse { .. }
            | ScantraderError::ConfigMissing { .. }
            | ScantraderError::ConfigInvalid { .. } => 2,
            ScantraderError::Database { .. } | ScantraderError::DatabaseQuery { .. } => 3,
            ScantraderError::MalformedInput { .. } => 4,
            ScantraderError::NoFeeds { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
