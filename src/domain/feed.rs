//! Streaming bar feed: a forward-only, bounded-memory cursor over one
//! symbol and one inclusive timestamp range.
//!
//! The feed pages rows from the [`BarStore`] port one chunk at a time using
//! keyset pagination on the timestamp, so a multi-year minute series never
//! materializes in memory. Emptiness of the requested range is detected at
//! `open`, before the engine fires any strategy hook.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::debug;

use super::bar::Bar;
use super::error::FeedError;
use crate::ports::bar_store::BarStore;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub struct Feed<'a> {
    store: &'a dyn BarStore,
    symbol: String,
    end: DateTime<Utc>,
    chunk_size: usize,
    buffer: VecDeque<Bar>,
    next_start: DateTime<Utc>,
    last_emitted: Option<DateTime<Utc>>,
    exhausted: bool,
}

impl std::fmt::Debug for Feed<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("symbol", &self.symbol)
            .field("end", &self.end)
            .field("chunk_size", &self.chunk_size)
            .field("buffer", &self.buffer)
            .field("next_start", &self.next_start)
            .field("last_emitted", &self.last_emitted)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<'a> Feed<'a> {
    /// Open a cursor over `[start, end]` for `symbol`.
    ///
    /// Fails with [`FeedError::NoData`] when the range matches zero rows.
    pub fn open(
        store: &'a dyn BarStore,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        chunk_size: usize,
    ) -> Result<Self, FeedError> {
        let chunk_size = chunk_size.max(1);
        let first = store.fetch_page(symbol, start, end, chunk_size)?;
        if first.is_empty() {
            return Err(FeedError::NoData {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }

        debug!(symbol, bars = first.len(), "feed opened");
        let exhausted = first.len() < chunk_size;
        let next_start = first
            .last()
            .map(|b| b.timestamp + Duration::milliseconds(1))
            .unwrap_or(start);

        Ok(Feed {
            store,
            symbol: symbol.to_string(),
            end,
            chunk_size,
            buffer: first.into(),
            next_start,
            last_emitted: None,
            exhausted,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Next bar in ascending timestamp order, or `None` once the range is
    /// drained. Rejects out-of-order rows from a misbehaving store.
    pub fn next_bar(&mut self) -> Result<Option<Bar>, FeedError> {
        if self.buffer.is_empty() {
            self.refill()?;
        }
        let Some(bar) = self.buffer.pop_front() else {
            return Ok(None);
        };

        if let Some(prev) = self.last_emitted {
            if bar.timestamp <= prev {
                return Err(FeedError::OutOfOrder {
                    symbol: self.symbol.clone(),
                    prev,
                    next: bar.timestamp,
                });
            }
        }
        self.last_emitted = Some(bar.timestamp);
        Ok(Some(bar))
    }

    fn refill(&mut self) -> Result<(), FeedError> {
        if self.exhausted || self.next_start > self.end {
            self.exhausted = true;
            return Ok(());
        }

        let page = self
            .store
            .fetch_page(&self.symbol, self.next_start, self.end, self.chunk_size)?;
        // A page shorter than the chunk means the window is drained.
        if page.len() < self.chunk_size {
            self.exhausted = true;
            debug!(symbol = %self.symbol, "feed exhausted");
        }
        if let Some(last) = page.last() {
            self.next_start = last.timestamp + Duration::milliseconds(1);
        }
        self.buffer = page.into();
        Ok(())
    }
}
