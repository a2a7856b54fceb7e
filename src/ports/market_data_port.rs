//! Historical price data port trait.

use crate::domain::error::DataError;
use crate::domain::frame::Panel;
use crate::domain::request::{Interval, Period};

pub trait MarketDataPort {
    /// Fetch a price panel for `symbols`. Fails with
    /// [`DataError::PricesMissing`] naming every symbol that has no data.
    fn download(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Panel, DataError>;
}
