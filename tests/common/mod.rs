#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use tapetrader::domain::bar::Bar;
use tapetrader::domain::error::FeedError;
use tapetrader::ports::bar_store::BarStore;

/// In-memory store for driving the feed/engine without a database.
pub struct MockBarStore {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl BarStore for MockBarStore {
    fn fetch_page(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(FeedError::Storage {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, FeedError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn symbol_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FeedError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(FeedError::Storage {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).and_then(|bars| {
            let first = bars.first()?.timestamp;
            let last = bars.last()?.timestamp;
            Some((first, last, bars.len()))
        }))
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()
}

pub fn minute(i: usize) -> DateTime<Utc> {
    base_time() + Duration::minutes(i as i64)
}

pub fn make_bar(symbol: &str, i: usize, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: minute(i),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000,
    }
}

pub fn make_bars(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, i, close))
        .collect()
}

/// Minute bars with a deterministic zig-zag around `start_price`, enough
/// structure for crossover strategies to trade.
pub fn zigzag_bars(symbol: &str, start_price: f64, count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let phase = (i % 20) as f64;
            let close = if (i / 20) % 2 == 0 {
                start_price + phase
            } else {
                start_price + 20.0 - phase
            };
            make_bar(symbol, i, close)
        })
        .collect()
}
