//! Performance metrics over a completed equity curve and trade log.
//!
//! Everything here is a pure function of its inputs: run the same feed and
//! strategy twice and the numbers match to the bit.

use super::portfolio::EquityPoint;
use super::position::{Side, Trade};

const DAYS_PER_YEAR: f64 = 365.25;
/// 252 trading days of 390 trading minutes.
const TRADING_MINUTES_PER_YEAR: f64 = 252.0 * 390.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub sharpe: f64,
    pub volatility_pct: f64,
    /// Reported as a non-positive percentage; 0 when equity never declined
    /// from its running peak.
    pub max_drawdown_pct: f64,
    pub num_trades: usize,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
}

impl Metrics {
    fn empty(initial_cash: f64) -> Self {
        Metrics {
            final_equity: initial_cash,
            total_return_pct: 0.0,
            cagr_pct: 0.0,
            sharpe: 0.0,
            volatility_pct: 0.0,
            max_drawdown_pct: 0.0,
            num_trades: 0,
            win_rate_pct: 0.0,
            profit_factor: 0.0,
        }
    }
}

/// Compute all metrics for one completed run.
pub fn analyze(initial_cash: f64, curve: &[EquityPoint], trades: &[Trade]) -> Metrics {
    let Some(last) = curve.last() else {
        return Metrics::empty(initial_cash);
    };

    let final_equity = last.equity;
    let total_return = if initial_cash > 0.0 {
        final_equity / initial_cash - 1.0
    } else {
        0.0
    };

    let first = &curve[0];
    let days_elapsed = (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0;
    let cagr = if days_elapsed > 0.0 && initial_cash > 0.0 {
        (final_equity / initial_cash).powf(DAYS_PER_YEAR / days_elapsed) - 1.0
    } else {
        0.0
    };

    let (sharpe, volatility) = sharpe_and_volatility(curve);
    let (wins, losses) = split_realized(trades);

    let realized = wins.len() + losses.len();
    let win_rate_pct = if realized > 0 {
        wins.len() as f64 / realized as f64 * 100.0
    } else {
        0.0
    };

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().map(|l| l.abs()).sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    Metrics {
        final_equity,
        total_return_pct: total_return * 100.0,
        cagr_pct: cagr * 100.0,
        sharpe,
        volatility_pct: volatility * 100.0,
        max_drawdown_pct: max_drawdown_pct(curve),
        num_trades: trades.len(),
        win_rate_pct,
        profit_factor,
    }
}

/// Maximum percentage decline from the running peak, as a non-positive
/// number. A running-maximum scan: the peak-so-far at each point.
pub fn max_drawdown_pct(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    -max_dd * 100.0
}

/// Annualized Sharpe ratio and volatility of per-bar returns.
///
/// The annualization factor is derived from the observed bar spacing, not
/// assumed: a minute-bar curve annualizes over 252 × 390 periods, an
/// hour-bar curve over proportionally fewer.
fn sharpe_and_volatility(curve: &[EquityPoint]) -> (f64, f64) {
    if curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                w[1].equity / w[0].equity - 1.0
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let minutes_per_bar = median_bar_minutes(curve);
    if stddev <= 0.0 || minutes_per_bar <= 0.0 {
        return (0.0, 0.0);
    }
    let periods_per_year = TRADING_MINUTES_PER_YEAR / minutes_per_bar;

    let sharpe = (mean / stddev) * periods_per_year.sqrt();
    let volatility = stddev * periods_per_year.sqrt();
    (sharpe, volatility)
}

fn median_bar_minutes(curve: &[EquityPoint]) -> f64 {
    let mut deltas: Vec<f64> = curve
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds() as f64 / 60.0)
        .collect();
    if deltas.is_empty() {
        return 0.0;
    }
    deltas.sort_by(f64::total_cmp);
    let mid = deltas.len() / 2;
    if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) / 2.0
    } else {
        deltas[mid]
    }
}

/// Realized P&L per sell, reconstructed from the trade log by replaying the
/// weighted-average cost basis. Returns (wins, losses).
fn split_realized(trades: &[Trade]) -> (Vec<f64>, Vec<f64>) {
    let mut quantity = 0_i64;
    let mut avg_cost = 0.0_f64;
    let mut wins = Vec::new();
    let mut losses = Vec::new();

    for trade in trades {
        match trade.side {
            Side::Buy => {
                let value = avg_cost * quantity as f64 + trade.price * trade.quantity as f64;
                quantity += trade.quantity;
                if quantity > 0 {
                    avg_cost = value / quantity as f64;
                }
            }
            Side::Sell => {
                let pnl = (trade.price - avg_cost) * trade.quantity as f64;
                if pnl > 0.0 {
                    wins.push(pnl);
                } else {
                    losses.push(pnl);
                }
                quantity -= trade.quantity;
                if quantity <= 0 {
                    quantity = 0;
                    avg_cost = 0.0;
                }
            }
        }
    }

    (wins, losses)
}

/// Metric a batch of runs can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    TotalReturn,
    Cagr,
    Sharpe,
    MaxDrawdown,
    Trades,
}

impl RankMetric {
    /// Sort key: larger is better for every variant (drawdown is
    /// non-positive, so closer to zero ranks higher).
    pub fn value(&self, metrics: &Metrics) -> f64 {
        match self {
            RankMetric::TotalReturn => metrics.total_return_pct,
            RankMetric::Cagr => metrics.cagr_pct,
            RankMetric::Sharpe => metrics.sharpe,
            RankMetric::MaxDrawdown => metrics.max_drawdown_pct,
            RankMetric::Trades => metrics.num_trades as f64,
        }
    }
}

impl std::str::FromStr for RankMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_return" => Ok(RankMetric::TotalReturn),
            "cagr" => Ok(RankMetric::Cagr),
            "sharpe" => Ok(RankMetric::Sharpe),
            "max_drawdown" => Ok(RankMetric::MaxDrawdown),
            "trades" => Ok(RankMetric::Trades),
            other => Err(format!("unknown ranking metric: {other}")),
        }
    }
}
