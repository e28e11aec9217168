//! Event-driven backtest engine.
//!
//! One engine drives one symbol through one strategy: pull a bar from the
//! feed, ask the strategy for a decision, apply it to the portfolio at the
//! bar's close, snapshot equity. The loop is strictly sequential and
//! deterministic: the same feed and strategy produce identical trade logs
//! and equity curves on every run.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::analyzer::{self, Metrics, RankMetric};
use super::bar::Bar;
use super::error::{PortfolioError, TapetraderError};
use super::feed::{DEFAULT_CHUNK_SIZE, Feed};
use super::portfolio::Portfolio;
use super::strategy::{Decision, Strategy};
use crate::ports::bar_store::BarStore;

/// Run lifecycle. `Ready` implies an open, non-empty feed; `Finished` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Ready,
    Running,
    Finished,
    Failed,
}

/// Result of one completed run: identity, bar count and computed metrics.
#[derive(Debug, Clone)]
pub struct Report {
    pub symbol: String,
    pub strategy: String,
    pub bars: usize,
    pub metrics: Metrics,
}

pub struct Engine<'a> {
    feed: Feed<'a>,
    strategy: Box<dyn Strategy>,
    portfolio: Portfolio,
    state: EngineState,
    bars_processed: usize,
}

impl<'a> Engine<'a> {
    /// A `Feed::open` success is the emptiness check: an engine is only ever
    /// constructed over a feed known to hold at least one bar.
    pub fn new(feed: Feed<'a>, strategy: Box<dyn Strategy>, initial_cash: f64) -> Self {
        Engine {
            feed,
            strategy,
            portfolio: Portfolio::new(initial_cash),
            state: EngineState::Ready,
            bars_processed: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Drive the run to a terminal state. Single-shot: a finished or failed
    /// engine stays terminal.
    pub fn run(&mut self) -> Result<Report, TapetraderError> {
        debug_assert!(self.state == EngineState::Ready, "run() is single-shot");
        self.state = EngineState::Running;
        info!(
            symbol = %self.feed.symbol(),
            strategy = self.strategy.name(),
            "starting backtest"
        );

        match self.drive() {
            Ok(()) => {
                self.state = EngineState::Finished;
                let metrics = analyzer::analyze(
                    self.portfolio.initial_cash(),
                    self.portfolio.equity_curve(),
                    self.portfolio.trade_log(),
                );
                info!(
                    symbol = %self.feed.symbol(),
                    bars = self.bars_processed,
                    total_return_pct = metrics.total_return_pct,
                    "backtest complete"
                );
                Ok(Report {
                    symbol: self.feed.symbol().to_string(),
                    strategy: self.strategy.name().to_string(),
                    bars: self.bars_processed,
                    metrics,
                })
            }
            Err(err) => {
                self.state = EngineState::Failed;
                error!(symbol = %self.feed.symbol(), error = %err, "backtest failed");
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<(), TapetraderError> {
        self.strategy
            .on_start()
            .map_err(TapetraderError::Strategy)?;

        while let Some(bar) = self.feed.next_bar()? {
            let decision = self
                .strategy
                .next(&bar)
                .map_err(TapetraderError::Strategy)?;
            self.apply(&bar, decision)?;
            // Mark-to-market after the fill so the snapshot carries the
            // bar's closing valuation.
            self.portfolio.update(&bar);
            self.bars_processed += 1;
        }

        self.strategy.on_end().map_err(TapetraderError::Strategy)?;
        Ok(())
    }

    /// Zero-or-one portfolio action per bar, filled at the bar's close.
    fn apply(&mut self, bar: &Bar, decision: Decision) -> Result<(), PortfolioError> {
        match decision {
            Decision::Hold => Ok(()),
            Decision::Buy(quantity) => {
                self.portfolio
                    .buy(&bar.symbol, quantity, bar.close, bar.timestamp)
            }
            Decision::Sell(quantity) => {
                self.portfolio
                    .sell(&bar.symbol, quantity, bar.close, bar.timestamp)
            }
        }
    }
}

/// Batch run configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub initial_cash: f64,
    pub chunk_size: usize,
    pub rank_by: RankMetric,
    /// When set, the first failed symbol aborts the whole batch instead of
    /// being recorded and skipped.
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            initial_cash: 100_000.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rank_by: RankMetric::TotalReturn,
            fail_fast: false,
        }
    }
}

/// A symbol whose run failed, with the originating error.
#[derive(Debug)]
pub struct FailedRun {
    pub symbol: String,
    pub error: TapetraderError,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// Completed runs, ranked per `BatchConfig::rank_by`.
    pub ranked: Vec<Report>,
    /// Failed runs, excluded from the ranking.
    pub failed: Vec<FailedRun>,
}

/// Run one independent simulation per symbol, with a fresh portfolio and a fresh
/// strategy instance so no state leaks across symbols, then rank the
/// completed runs.
pub fn run_multiple(
    store: &dyn BarStore,
    symbols: &[String],
    new_strategy: &dyn Fn() -> Box<dyn Strategy>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: &BatchConfig,
) -> Result<BatchOutcome, TapetraderError> {
    let mut ranked = Vec::new();
    let mut failed = Vec::new();

    for symbol in symbols {
        let outcome = Feed::open(store, symbol, start, end, config.chunk_size)
            .map_err(TapetraderError::from)
            .and_then(|feed| Engine::new(feed, new_strategy(), config.initial_cash).run());

        match outcome {
            Ok(report) => ranked.push(report),
            Err(error) => {
                if config.fail_fast {
                    return Err(error);
                }
                warn!(symbol = %symbol, error = %error, "run failed, excluded from ranking");
                failed.push(FailedRun {
                    symbol: symbol.clone(),
                    error,
                });
            }
        }
    }

    rank(&mut ranked, config.rank_by);
    Ok(BatchOutcome { ranked, failed })
}

/// Stable sort, descending by the chosen metric, ties broken by symbol
/// ascending for a deterministic order.
pub fn rank(reports: &mut [Report], metric: RankMetric) {
    reports.sort_by(|a, b| {
        metric
            .value(&b.metrics)
            .total_cmp(&metric.value(&a.metrics))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
