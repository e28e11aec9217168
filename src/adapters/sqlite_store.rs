//! SQLite bar store adapter.
//!
//! Schema: one `bars` table keyed by (symbol, ts) with timestamps as unix
//! milliseconds UTC. The composite primary key makes the feed's paged range
//! query an index walk, so chunked reads stay cheap on multi-year minute
//! data.

use crate::domain::bar::Bar;
use crate::domain::error::{FeedError, TapetraderError};
use crate::ports::bar_store::BarStore;
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn storage<E: std::fmt::Display>(err: E) -> FeedError {
    FeedError::Storage {
        reason: err.to_string(),
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, FeedError> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| FeedError::Storage {
        reason: format!("timestamp out of range: {ms}"),
    })
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TapetraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TapetraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| TapetraderError::Feed(storage(e)))?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, FeedError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FeedError> {
        self.pool.get().map_err(storage)
    }

    pub fn initialize_schema(&self) -> Result<(), FeedError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS bars (
                    symbol TEXT NOT NULL,
                    ts INTEGER NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (symbol, ts)
                );",
            )
            .map_err(storage)
    }

    /// Bulk upsert, used by tests and external seeding jobs. The one-time
    /// ETL that builds a production database lives outside this crate.
    pub fn insert_bars(&self, bars: &[Bar]) -> Result<(), FeedError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars (symbol, ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.timestamp_ms(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(storage)?;
        }

        tx.commit().map_err(storage)
    }
}

impl BarStore for SqliteStore {
    fn fetch_page(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT symbol, ts, open, high, low, close, volume
                 FROM bars
                 WHERE symbol = ?1 AND ts >= ?2 AND ts <= ?3
                 ORDER BY ts ASC
                 LIMIT ?4",
            )
            .map_err(storage)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start.timestamp_millis(),
                    end.timestamp_millis(),
                    limit as i64
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .map_err(storage)?;

        let mut bars = Vec::new();
        for row in rows {
            let (symbol, ts, open, high, low, close, volume) = row.map_err(storage)?;
            bars.push(Bar {
                symbol,
                timestamp: from_millis(ts)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, FeedError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM bars ORDER BY symbol")
            .map_err(storage)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(storage)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(storage)?);
        }

        Ok(symbols)
    }

    fn symbol_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FeedError> {
        let conn = self.conn()?;

        let result: (Option<i64>, Option<i64>, i64) = conn
            .query_row(
                "SELECT MIN(ts), MAX(ts), COUNT(*) FROM bars WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(storage)?;

        match result {
            (Some(min_ms), Some(max_ms), count) if count > 0 => Ok(Some((
                from_millis(min_ms)?,
                from_millis(max_ms)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}
