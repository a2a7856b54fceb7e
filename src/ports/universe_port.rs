//! Ticker universe port trait.

use crate::domain::universe::UniverseError;

pub trait UniversePort {
    /// Raw symbols in source order, before normalization.
    fn load_symbols(&self) -> Result<Vec<String>, UniverseError>;
}
