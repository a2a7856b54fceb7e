//! Portfolio simulation port trait.

use crate::domain::error::SimulationError;
use crate::domain::simulation::{PortfolioResult, SignalTriple, SimulationConfig};

pub trait SimulationPort {
    fn from_signals(
        &self,
        triple: &SignalTriple,
        config: &SimulationConfig,
    ) -> Result<PortfolioResult, SimulationError>;
}
