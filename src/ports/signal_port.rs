//! Scanner signal feed port.

use crate::domain::error::ScantraderError;
use crate::domain::signal::Signal;

pub trait SignalPort {
    /// Names of the available feeds, sorted.
    fn list_feeds(&self) -> Result<Vec<String>, ScantraderError>;

    /// All signals of one feed. A structurally broken feed is a
    /// `MalformedInput` error.
    fn load_feed(&self, feed: &str) -> Result<Vec<Signal>, ScantraderError>;
}
