//! OHLCV bar representation.

use chrono::{DateTime, Utc};

/// One time-stamped OHLCV sample for one symbol. Created by the feed,
/// consumed read-only by strategy, portfolio and engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// Unix milliseconds, the storage-layer timestamp encoding.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
