//! Storage read port consumed by the feed.

use crate::domain::bar::Bar;
use crate::domain::error::FeedError;
use chrono::{DateTime, Utc};

/// Narrow read contract over the bar store: one ascending range query, paged
/// by the caller. Alternate backends satisfy this without touching the
/// engine, portfolio or analyzer.
pub trait BarStore {
    /// Up to `limit` bars for `symbol` with timestamps in `[start, end]`
    /// (inclusive), ascending by timestamp. An empty vec means no rows
    /// remain in the window.
    fn fetch_page(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError>;

    /// Distinct symbols present in the store, ascending.
    fn list_symbols(&self) -> Result<Vec<String>, FeedError>;

    /// First timestamp, last timestamp and row count for `symbol`, or
    /// `None` when the store holds nothing for it.
    fn symbol_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FeedError>;
}
