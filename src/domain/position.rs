//! Position and trade records.

use chrono::{DateTime, Utc};

/// An open holding in one symbol. Quantity is always a non-negative whole
/// number of shares; shorting is out of scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    /// Weighted-average cost basis per share.
    pub avg_cost: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.avg_cost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// One executed fill, appended to the portfolio's audit trail. Never mutated
/// or removed once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    /// Signed cash movement: negative for buys, positive for sells.
    pub cash_delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_position() -> Position {
        Position {
            symbol: "AAPL".into(),
            quantity: 100,
            avg_cost: 50.0,
        }
    }

    #[test]
    fn market_value_at_price() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_gain() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_loss() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(45.0) - (-500.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn trade_fields() {
        let trade = Trade {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap(),
            symbol: "AAPL".into(),
            side: Side::Buy,
            quantity: 10,
            price: 50.0,
            cash_delta: -500.0,
        };
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.quantity, 10);
        assert!((trade.cash_delta + 500.0).abs() < f64::EPSILON);
    }
}
