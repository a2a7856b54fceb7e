//! Cash-sharing basket state and equity tracking.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Every symbol in the basket draws on the same cash balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub positions: HashMap<String, Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            positions: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn remove_position(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Cash plus holdings valued at `price_map`. Symbols without a price
    /// contribute nothing.
    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .filter_map(|pos| {
                price_map
                    .get(&pos.symbol)
                    .map(|&price| pos.market_value(price))
            })
            .sum();
        self.cash + position_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeStatus;

    fn sample_position(symbol: &str, quantity: f64) -> Position {
        Position {
            symbol: symbol.to_string(),
            quantity,
            entry_price: 100.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            entry_fees: 0.0,
        }
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(10_000.0);
        assert!((portfolio.cash - 10_000.0).abs() < f64::EPSILON);
        assert!((portfolio.initial_cash - 10_000.0).abs() < f64::EPSILON);
        assert!(portfolio.positions.is_empty());
        assert!(portfolio.trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
    }

    #[test]
    fn add_get_remove_position() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.add_position(sample_position("INFY.NS", 3.5));

        assert!(portfolio.has_position("INFY.NS"));
        assert_eq!(portfolio.get_position("INFY.NS").unwrap().quantity, 3.5);
        assert_eq!(portfolio.position_count(), 1);

        assert!(portfolio.remove_position("INFY.NS").is_some());
        assert!(!portfolio.has_position("INFY.NS"));
        assert!(portfolio.remove_position("INFY.NS").is_none());
    }

    #[test]
    fn record_trade_and_equity() {
        let mut portfolio = Portfolio::new(10_000.0);
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        portfolio.record_trade(Trade {
            symbol: "TCS.NS".into(),
            quantity: 1.0,
            entry_date: date,
            entry_price: 10.0,
            exit_date: date,
            exit_price: 11.0,
            fees: 0.0,
            pnl: 1.0,
            status: TradeStatus::Closed,
        });
        portfolio.record_equity(date, 10_001.0);
        assert_eq!(portfolio.trades.len(), 1);
        assert_eq!(portfolio.equity_curve[0].equity, 10_001.0);
    }

    #[test]
    fn total_equity_shares_cash_across_symbols() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.cash = 5_000.0;
        portfolio.add_position(sample_position("A.NS", 10.0));
        portfolio.add_position(sample_position("B.NS", 20.0));

        let mut prices = HashMap::new();
        prices.insert("A.NS".to_string(), 110.0);
        prices.insert("B.NS".to_string(), 90.0);

        let equity = portfolio.total_equity(&prices);
        assert!((equity - (5_000.0 + 1_100.0 + 1_800.0)).abs() < 1e-9);
    }

    #[test]
    fn total_equity_ignores_unpriced_symbols() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.add_position(sample_position("A.NS", 1.0));
        assert!((portfolio.total_equity(&HashMap::new()) - 1_000.0).abs() < f64::EPSILON);
    }
}
