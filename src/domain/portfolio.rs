//! Portfolio accounting: cash, open positions, trade log, equity curve.
//!
//! The portfolio is mutated only by accepted `buy`/`sell` calls and by the
//! passive mark-to-market in `update`. Trades are sized in whole shares;
//! requests the cash (or the held quantity) cannot cover are clamped, and a
//! clamp down to zero is a silent no-op rather than an error.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::bar::Bar;
use super::error::PortfolioError;
use super::position::{Position, Side, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: f64,
    initial_cash: f64,
    positions: HashMap<String, Position>,
    last_close: HashMap<String, f64>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            positions: HashMap::new(),
            last_close: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Held quantity for `symbol`, zero when no position is open.
    pub fn quantity(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    /// Buy up to `quantity` whole shares at `price`.
    ///
    /// The fill is clamped to what cash allows: min(quantity, floor(cash /
    /// price)). A clamp down to zero records nothing and changes nothing.
    pub fn buy(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PortfolioError> {
        self.validate(symbol, quantity, price)?;

        let affordable = (self.cash / price).floor() as i64;
        let mut fill = quantity.min(affordable);
        if fill <= 0 {
            return Ok(());
        }

        // floor() guarantees fill * price <= cash mathematically; guard the
        // float rounding edge where the product lands just above.
        let mut cost = fill as f64 * price;
        if cost > self.cash {
            fill -= 1;
            if fill == 0 {
                return Ok(());
            }
            cost = fill as f64 * price;
        }

        self.cash -= cost;

        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position {
                symbol: symbol.to_string(),
                quantity: 0,
                avg_cost: 0.0,
            });
        let prior_value = position.avg_cost * position.quantity as f64;
        position.quantity += fill;
        position.avg_cost = (prior_value + cost) / position.quantity as f64;

        self.trades.push(Trade {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity: fill,
            price,
            cash_delta: -cost,
        });

        Ok(())
    }

    /// Sell up to `quantity` whole shares at `price`.
    ///
    /// The fill is clamped to the held quantity; selling with no open
    /// position is a no-op. The position entry is removed when its quantity
    /// returns to zero.
    pub fn sell(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PortfolioError> {
        self.validate(symbol, quantity, price)?;

        let held = self.quantity(symbol);
        let fill = quantity.min(held);
        if fill <= 0 {
            return Ok(());
        }

        let proceeds = fill as f64 * price;
        self.cash += proceeds;

        if let Some(position) = self.positions.get_mut(symbol) {
            position.quantity -= fill;
            if position.quantity == 0 {
                self.positions.remove(symbol);
            }
        }

        self.trades.push(Trade {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity: fill,
            price,
            cash_delta: proceeds,
        });

        Ok(())
    }

    /// Mark the bar's symbol to its close and append one equity snapshot.
    ///
    /// Called exactly once per bar, after the bar's decision has been
    /// applied. Valuation uses closing prices only; intrabar movement is not
    /// modelled.
    pub fn update(&mut self, bar: &Bar) {
        self.last_close.insert(bar.symbol.clone(), bar.close);
        let equity = self.total_equity();
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity,
        });
    }

    /// Cash plus every position valued at its last known close.
    pub fn total_equity(&self) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = self
                    .last_close
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.avg_cost);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    pub fn trade_log(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    fn validate(&self, symbol: &str, quantity: i64, price: f64) -> Result<(), PortfolioError> {
        if quantity <= 0 {
            return Err(PortfolioError::InvalidQuantity {
                symbol: symbol.to_string(),
                quantity,
            });
        }
        if price <= 0.0 || !price.is_finite() {
            return Err(PortfolioError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
        Ok(())
    }
}
