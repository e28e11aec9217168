//! Domain error types.
//!
//! Each core component has its own error enum; `TapetraderError` is the
//! top-level type the engine and CLI work with. Insufficient cash or
//! insufficient shares are deliberately NOT errors anywhere here; those are
//! expected runtime outcomes handled as no-op trades.

use chrono::{DateTime, Utc};

/// Failures raised by the streaming bar feed. Fatal for the run, never
/// retried inside the core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    #[error("no bars for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("bars out of order for {symbol}: {prev} followed by {next}")]
    OutOfOrder {
        symbol: String,
        prev: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("storage error: {reason}")]
    Storage { reason: String },
}

/// Invalid trade input. Raised only for malformed requests; "cannot afford"
/// and "nothing to sell" are no-ops, not errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortfolioError {
    #[error("invalid quantity {quantity} for {symbol}: must be a positive whole number of shares")]
    InvalidQuantity { symbol: String, quantity: i64 },

    #[error("invalid price {price} for {symbol}: must be positive and finite")]
    InvalidPrice { symbol: String, price: f64 },
}

/// Any failure surfaced by an external strategy, propagated unchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("strategy {name} failed: {reason}")]
pub struct StrategyError {
    pub name: String,
    pub reason: String,
}

/// Top-level error type for tapetrader.
#[derive(Debug, thiserror::Error)]
pub enum TapetraderError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Portfolio(#[from] PortfolioError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

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

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TapetraderError> for std::process::ExitCode {
    fn from(err: &TapetraderError) -> Self {
        let code: u8 = match err {
            TapetraderError::Io(_) | TapetraderError::Report { .. } => 1,
            TapetraderError::ConfigParse { .. }
            | TapetraderError::ConfigMissing { .. }
            | TapetraderError::ConfigInvalid { .. } => 2,
            TapetraderError::Feed(_) => 3,
            TapetraderError::Portfolio(_) => 4,
            TapetraderError::Strategy(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
