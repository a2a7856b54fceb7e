//! Order fills for the basket simulation.
//!
//! Long-only. Entries size against available cash, fees are a fraction of
//! traded value charged on both legs, and quantities are fractional.

use chrono::NaiveDate;

use super::portfolio::Portfolio;
use super::position::{Position, Trade, TradeStatus};
use super::simulation::{SimulationConfig, SizeType};

/// Fee for a fill: `trade_value * fees`.
pub fn calculate_fees(trade_value: f64, fees: f64) -> f64 {
    trade_value * fees
}

/// Cash committed to an entry, fees included.
pub fn order_budget(cash: f64, config: &SimulationConfig) -> f64 {
    let budget = match config.size_type {
        SizeType::Percent => cash * config.size,
        SizeType::Value => config.size,
    };
    budget.min(cash).max(0.0)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        price: f64,
        cost: f64,
        fees: f64,
    },
    AlreadyOpen,
    InsufficientCash,
    InvalidPrice,
}

/// Buy `symbol` at `price` unless a position is already open.
///
/// The budget covers both notional and fee, so
/// `quantity = budget / (price * (1 + fees))`.
pub fn enter_long(
    portfolio: &mut Portfolio,
    symbol: &str,
    price: f64,
    date: NaiveDate,
    config: &SimulationConfig,
) -> EntryResult {
    if portfolio.has_position(symbol) {
        return EntryResult::AlreadyOpen;
    }
    if !price.is_finite() || price <= 0.0 {
        return EntryResult::InvalidPrice;
    }

    let budget = order_budget(portfolio.cash, config);
    let quantity = budget / (price * (1.0 + config.fees));
    if quantity <= 0.0 || !quantity.is_finite() {
        return EntryResult::InsufficientCash;
    }

    let cost = quantity * price;
    let fees = calculate_fees(cost, config.fees);
    portfolio.cash -= cost + fees;

    portfolio.add_position(Position {
        symbol: symbol.to_string(),
        quantity,
        entry_price: price,
        entry_date: date,
        entry_fees: fees,
    });

    EntryResult::Entered {
        quantity,
        price,
        cost,
        fees,
    }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: f64,
    pub exit_price: f64,
    pub exit_value: f64,
    pub exit_fees: f64,
    pub pnl: f64,
}

/// Sell the whole position in `symbol` and record the closed trade.
/// Returns `None` when nothing is held or the price is unusable.
pub fn exit_long(
    portfolio: &mut Portfolio,
    symbol: &str,
    price: f64,
    date: NaiveDate,
    fees: f64,
) -> Option<ExitResult> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let position = portfolio.remove_position(symbol)?;

    let exit_value = position.quantity * price;
    let exit_fees = calculate_fees(exit_value, fees);
    let pnl = position.quantity * (price - position.entry_price) - position.entry_fees - exit_fees;

    portfolio.cash += exit_value - exit_fees;
    portfolio.record_trade(Trade {
        symbol: position.symbol,
        quantity: position.quantity,
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date: date,
        exit_price: price,
        fees: position.entry_fees + exit_fees,
        pnl,
        status: TradeStatus::Closed,
    });

    Some(ExitResult {
        quantity: position.quantity,
        exit_price: price,
        exit_value,
        exit_fees,
        pnl,
    })
}

/// Ledger entry for a position still held when the data ends, valued at
/// `price` without exit fees.
pub fn mark_open(position: &Position, price: f64, date: NaiveDate) -> Trade {
    Trade {
        symbol: position.symbol.clone(),
        quantity: position.quantity,
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date: date,
        exit_price: price,
        fees: position.entry_fees,
        pnl: position.unrealized_pnl(price),
        status: TradeStatus::Open,
    }
}
