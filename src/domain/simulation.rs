//! Signal-driven portfolio simulation.
//!
//! Given `close` and boolean `entries`/`exits` tables with identical labels,
//! [`simulate`] walks the dates in order. On each date exits fill before
//! entries, a cell with both signals set does nothing, and prices are the
//! close of that date. Unfilled positions are reported as open trades.

use std::collections::HashMap;

use crate::domain::error::SimulationError;
use crate::domain::execution::{enter_long, exit_long, mark_open, EntryResult};
use crate::domain::frame::Frame;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::Trade;

pub const DEFAULT_FEES: f64 = 0.001;

/// The validated output of one attempt (or of the fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTriple {
    pub close: Frame<f64>,
    pub entries: Frame<bool>,
    pub exits: Frame<bool>,
}

impl SignalTriple {
    pub fn shape(&self) -> (usize, usize) {
        self.close.shape()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeType {
    /// `size` is a fraction of available cash.
    Percent,
    /// `size` is a cash amount per entry.
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One cash balance shared by every symbol.
    CashSharingBasket,
    /// Each symbol starts with its own `init_cash`.
    Independent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub init_cash: f64,
    pub fees: f64,
    pub size: f64,
    pub size_type: SizeType,
    pub grouping: Grouping,
}

impl SimulationConfig {
    pub fn new(init_cash: f64, size: f64) -> Self {
        Self {
            init_cash,
            fees: DEFAULT_FEES,
            size,
            size_type: SizeType::Percent,
            grouping: Grouping::CashSharingBasket,
        }
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |key: &str, reason: &str| SimulationError::InvalidConfig {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if !(self.init_cash.is_finite() && self.init_cash > 0.0) {
            return Err(invalid("init_cash", "must be a positive number"));
        }
        if !(self.fees.is_finite() && (0.0..1.0).contains(&self.fees)) {
            return Err(invalid("fees", "must be in [0, 1)"));
        }
        match self.size_type {
            SizeType::Percent if !(self.size > 0.0 && self.size <= 1.0) => {
                Err(invalid("size", "must be in (0, 1] for percent sizing"))
            }
            SizeType::Value if !(self.size.is_finite() && self.size > 0.0) => {
                Err(invalid("size", "must be a positive cash amount"))
            }
            _ => Ok(()),
        }
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioResult {
    pub start_value: f64,
    pub end_value: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub metrics: Metrics,
}

impl PortfolioResult {
    pub fn total_return(&self) -> f64 {
        self.metrics.total_return
    }

    pub fn max_drawdown(&self) -> f64 {
        self.metrics.max_drawdown
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

fn check_shape(name: &str, signals: &Frame<bool>, close: &Frame<f64>) -> Result<(), SimulationError> {
    if signals.same_labels(close) {
        Ok(())
    } else {
        Err(SimulationError::ShapeMismatch {
            name: name.to_string(),
            signals: signals.shape(),
            close: close.shape(),
        })
    }
}

pub fn simulate(
    triple: &SignalTriple,
    config: &SimulationConfig,
) -> Result<PortfolioResult, SimulationError> {
    config.validate()?;
    let close = &triple.close;
    let (rows, cols) = close.shape();
    if rows == 0 || cols == 0 {
        return Err(SimulationError::Empty { rows, cols });
    }
    check_shape("entries", &triple.entries, close)?;
    check_shape("exits", &triple.exits, close)?;

    let groups: Vec<Vec<usize>> = match config.grouping {
        Grouping::CashSharingBasket => vec![(0..cols).collect()],
        Grouping::Independent => (0..cols).map(|c| vec![c]).collect(),
    };
    let mut portfolios: Vec<Portfolio> = groups
        .iter()
        .map(|_| Portfolio::new(config.init_cash))
        .collect();
    let start_value = config.init_cash * groups.len() as f64;

    let symbols = close.columns();
    let mut last_price: HashMap<String, f64> = HashMap::new();
    let mut equity_curve = Vec::with_capacity(rows);

    for (r, &date) in close.index().iter().enumerate() {
        for (c, symbol) in symbols.iter().enumerate() {
            let price = close.get(r, c);
            if price.is_finite() {
                last_price.insert(symbol.clone(), price);
            }
        }

        for (group, portfolio) in groups.iter().zip(portfolios.iter_mut()) {
            for &c in group {
                if triple.exits.get(r, c) && !triple.entries.get(r, c) {
                    if let Some(exit) =
                        exit_long(portfolio, &symbols[c], close.get(r, c), date, config.fees)
                    {
                        log::debug!("{date} exit {} pnl {:.2}", symbols[c], exit.pnl);
                    }
                }
            }
            for &c in group {
                if triple.entries.get(r, c) && !triple.exits.get(r, c) {
                    let result = enter_long(portfolio, &symbols[c], close.get(r, c), date, config);
                    if let EntryResult::Entered { quantity, price, .. } = result {
                        log::debug!("{date} entry {} {quantity:.4} @ {price:.2}", symbols[c]);
                    }
                }
            }
            let equity = portfolio.total_equity(&last_price);
            portfolio.record_equity(date, equity);
        }

        let equity: f64 = portfolios
            .iter()
            .filter_map(|p| p.equity_curve.last())
            .map(|p| p.equity)
            .sum();
        equity_curve.push(EquityPoint { date, equity });
    }

    let last_date = close.index()[rows - 1];
    let mut trades = Vec::new();
    let mut open = Vec::new();
    for portfolio in &portfolios {
        trades.extend(portfolio.trades.iter().cloned());
        for c in 0..cols {
            if let Some(position) = portfolio.get_position(&symbols[c]) {
                let price = last_price
                    .get(&symbols[c])
                    .copied()
                    .unwrap_or(position.entry_price);
                open.push(mark_open(position, price, last_date));
            }
        }
    }
    trades.sort_by_key(|t| t.exit_date);
    trades.extend(open);

    let end_value = equity_curve.last().map(|p| p.equity).unwrap_or(start_value);
    let metrics = Metrics::compute(start_value, &equity_curve, &trades);

    Ok(PortfolioResult {
        start_value,
        end_value,
        equity_curve,
        trades,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeStatus;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect()
    }

    fn close(prices: &[&[f64]]) -> Frame<f64> {
        let columns = (0..prices.len())
            .map(|c| (format!("S{c}.NS"), prices[c].to_vec()))
            .collect();
        Frame::from_columns(dates(prices[0].len()), columns).unwrap()
    }

    fn signals(close: &Frame<f64>, cells: &[(usize, usize)]) -> Frame<bool> {
        let mut frame = Frame::full_like(close, false);
        for &(r, c) in cells {
            frame.set(r, c, true);
        }
        frame
    }

    fn no_fee(size: f64) -> SimulationConfig {
        SimulationConfig::new(10_000.0, size).with_fees(0.0)
    }

    #[test]
    fn config_defaults() {
        let config = SimulationConfig::new(10_000.0, 0.2);
        assert_eq!(config.fees, 0.001);
        assert_eq!(config.size_type, SizeType::Percent);
        assert_eq!(config.grouping, Grouping::CashSharingBasket);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(SimulationConfig::new(0.0, 0.2).validate().is_err());
        assert!(SimulationConfig::new(10.0, 1.5).validate().is_err());
        assert!(SimulationConfig::new(10.0, 0.2).with_fees(-0.1).validate().is_err());
    }

    #[test]
    fn round_trip_trade() {
        let close = close(&[&[100.0, 100.0, 110.0, 120.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0)]),
            exits: signals(&close, &[(2, 0)]),
            close,
        };
        let result = simulate(&triple, &no_fee(0.5)).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].status, TradeStatus::Closed);
        assert_relative_eq!(result.trades[0].pnl, 500.0, epsilon = 1e-9);
        assert_relative_eq!(result.end_value, 10_500.0, epsilon = 1e-9);
        assert_relative_eq!(result.total_return(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn open_position_is_reported_at_last_price() {
        let close = close(&[&[100.0, 105.0, 110.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0)]),
            exits: signals(&close, &[]),
            close,
        };
        let result = simulate(&triple, &no_fee(1.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].status, TradeStatus::Open);
        assert_relative_eq!(result.trades[0].exit_price, 110.0);
        assert_relative_eq!(result.end_value, 11_000.0, epsilon = 1e-9);
    }

    #[test]
    fn basket_shares_cash() {
        let close = close(&[&[10.0, 10.0], &[20.0, 20.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0), (0, 1)]),
            exits: signals(&close, &[]),
            close,
        };
        let result = simulate(&triple, &no_fee(0.5)).unwrap();
        let quantities: Vec<f64> = result.trades.iter().map(|t| t.quantity * t.entry_price).collect();
        assert_relative_eq!(quantities[0], 5_000.0, epsilon = 1e-9);
        assert_relative_eq!(quantities[1], 2_500.0, epsilon = 1e-9);
        assert_relative_eq!(result.start_value, 10_000.0);
    }

    #[test]
    fn independent_grouping_gives_each_symbol_its_cash() {
        let close = close(&[&[10.0, 10.0], &[20.0, 20.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0), (0, 1)]),
            exits: signals(&close, &[]),
            close,
        };
        let config = SimulationConfig {
            grouping: Grouping::Independent,
            ..no_fee(0.5)
        };
        let result = simulate(&triple, &config).unwrap();
        assert_relative_eq!(result.start_value, 20_000.0);
        for trade in &result.trades {
            assert_relative_eq!(trade.quantity * trade.entry_price, 5_000.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn conflicting_signals_are_ignored() {
        let close = close(&[&[10.0, 11.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0)]),
            exits: signals(&close, &[(0, 0)]),
            close,
        };
        let result = simulate(&triple, &no_fee(0.5)).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn nan_price_skips_entry() {
        let close = close(&[&[f64::NAN, 10.0, 12.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0)]),
            exits: signals(&close, &[]),
            close,
        };
        let result = simulate(&triple, &no_fee(0.5)).unwrap();
        assert!(result.trades.is_empty());
        assert_relative_eq!(result.end_value, 10_000.0);
    }

    #[test]
    fn fees_reduce_end_value() {
        let close = close(&[&[100.0, 100.0]]);
        let triple = SignalTriple {
            entries: signals(&close, &[(0, 0)]),
            exits: signals(&close, &[(1, 0)]),
            close,
        };
        let result = simulate(&triple, &SimulationConfig::new(10_000.0, 1.0)).unwrap();
        assert!(result.end_value < 10_000.0);
        assert!(result.trades[0].pnl < 0.0);
    }

    #[test]
    fn empty_close_is_an_error() {
        let close = Frame::<f64>::new(vec![], vec![], vec![]).unwrap();
        let triple = SignalTriple {
            entries: Frame::full_like(&close, false),
            exits: Frame::full_like(&close, false),
            close,
        };
        let err = simulate(&triple, &no_fee(0.5)).unwrap_err();
        assert_eq!(err, SimulationError::Empty { rows: 0, cols: 0 });
    }

    #[test]
    fn misaligned_signals_are_an_error() {
        let close = close(&[&[1.0, 2.0], &[1.0, 2.0]]);
        let narrow = close.select_columns(&[0]);
        let triple = SignalTriple {
            entries: Frame::full_like(&narrow, false),
            exits: Frame::full_like(&close, false),
            close,
        };
        let err = simulate(&triple, &no_fee(0.5)).unwrap_err();
        assert!(err.to_string().contains("doesn't match"));
    }
}
