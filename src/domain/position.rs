//! Open positions and the trade ledger of a basket simulation.

use chrono::NaiveDate;

/// A long holding in one symbol. Quantities are fractional.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_fees: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price) - self.entry_fees
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Open,
    Closed,
}

/// One round trip. Trades still open at the end of the data are marked
/// [`TradeStatus::Open`] and valued at the last known price.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub quantity: f64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub fees: f64,
    pub pnl: f64,
    pub status: TradeStatus,
}

impl Trade {
    /// PnL relative to the entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.quantity * self.entry_price;
        if notional > 0.0 {
            self.pnl / notional
        } else {
            0.0
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }
}
