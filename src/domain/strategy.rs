//! Strategy capability contract and reference implementations.
//!
//! A strategy sees one bar at a time and answers with a [`Decision`]. It may
//! keep whatever internal state it likes between calls, but the bar is
//! borrowed for the duration of `next` only, and implementations must not retain
//! it. Strategies have no access to the portfolio; sizing requests are
//! clamped by the portfolio itself (see [`ALL_SHARES`]).

use super::bar::Bar;
use super::error::StrategyError;
use std::collections::VecDeque;

/// Sizing request meaning "as many shares as the portfolio allows".
/// The portfolio clamps buys to affordable cash and sells to the held
/// quantity, so the maximum representable request acts as "all".
pub const ALL_SHARES: i64 = i64::MAX;

/// What a strategy wants done with the current bar. At most one portfolio
/// action per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Buy(i64),
    Sell(i64),
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Called once before the first bar.
    fn on_start(&mut self) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called once per bar, in feed order.
    fn next(&mut self, bar: &Bar) -> Result<Decision, StrategyError>;

    /// Called once after the last bar.
    fn on_end(&mut self) -> Result<(), StrategyError> {
        Ok(())
    }
}

/// Buys the maximum affordable quantity on the first bar and never trades
/// again.
#[derive(Debug, Default)]
pub struct BuyAndHold {
    entered: bool,
}

impl BuyAndHold {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn next(&mut self, _bar: &Bar) -> Result<Decision, StrategyError> {
        if self.entered {
            return Ok(Decision::Hold);
        }
        self.entered = true;
        Ok(Decision::Buy(ALL_SHARES))
    }
}

/// Fast/slow simple-moving-average crossover.
///
/// Buys a fixed quantity on a fresh bullish cross (fast SMA moving above the
/// slow) and liquidates on a fresh bearish cross. The first bar where both
/// averages exist only records the market state, so a backtest never opens a
/// trade on stale warm-up data.
#[derive(Debug)]
pub struct SmaCrossover {
    fast: usize,
    slow: usize,
    trade_size: i64,
    closes: VecDeque<f64>,
    prev_bullish: Option<bool>,
}

impl SmaCrossover {
    /// `fast` must be at least 1 and strictly shorter than `slow`.
    pub fn new(fast: usize, slow: usize, trade_size: i64) -> Self {
        assert!(fast >= 1 && fast < slow, "fast period must be in 1..slow");
        assert!(trade_size > 0, "trade size must be positive");
        SmaCrossover {
            fast,
            slow,
            trade_size,
            closes: VecDeque::with_capacity(slow),
            prev_bullish: None,
        }
    }

    fn sma(&self, period: usize) -> Option<f64> {
        if self.closes.len() < period {
            return None;
        }
        let sum: f64 = self.closes.iter().rev().take(period).sum();
        Some(sum / period as f64)
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn next(&mut self, bar: &Bar) -> Result<Decision, StrategyError> {
        if self.closes.len() == self.slow {
            self.closes.pop_front();
        }
        self.closes.push_back(bar.close);

        let (Some(fast), Some(slow)) = (self.sma(self.fast), self.sma(self.slow)) else {
            return Ok(Decision::Hold);
        };

        let bullish = fast > slow;
        let decision = match self.prev_bullish {
            // First bar with both averages: record state, do not trade.
            None => Decision::Hold,
            Some(prev) if bullish && !prev => Decision::Buy(self.trade_size),
            Some(prev) if !bullish && prev => Decision::Sell(ALL_SHARES),
            Some(_) => Decision::Hold,
        };
        self.prev_bullish = Some(bullish);
        Ok(decision)
    }
}
