//! In-process simulation adapter backed by the basket engine.

use crate::domain::error::SimulationError;
use crate::domain::simulation::{PortfolioResult, SignalTriple, SimulationConfig, simulate};
use crate::ports::simulation_port::SimulationPort;

/// Runs [`simulate`] directly. Stateless, so one instance serves every
/// attempt and the fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasketSimulator;

impl BasketSimulator {
    pub fn new() -> Self {
        Self
    }
}

impl SimulationPort for BasketSimulator {
    fn from_signals(
        &self,
        triple: &SignalTriple,
        config: &SimulationConfig,
    ) -> Result<PortfolioResult, SimulationError> {
        let (rows, cols) = triple.shape();
        log::debug!("simulating {rows} bars x {cols} symbols");
        let result = simulate(triple, config)?;
        log::info!(
            "simulation finished: {} trades, total return {:.2}%",
            result.trade_count(),
            result.total_return() * 100.0
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::Frame;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn triple(prices: &[f64], entry: usize, exit: usize) -> SignalTriple {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let index: Vec<NaiveDate> = (0..prices.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        let close = Frame::new(index, vec!["A.NS".into()], prices.to_vec()).unwrap();
        let mut entries = Frame::full_like(&close, false);
        let mut exits = Frame::full_like(&close, false);
        entries.set(entry, 0, true);
        exits.set(exit, 0, true);
        SignalTriple {
            close,
            entries,
            exits,
        }
    }

    #[test]
    fn delegates_to_engine() {
        let t = triple(&[100.0, 100.0, 110.0, 120.0], 1, 3);
        let config = SimulationConfig::new(10_000.0, 1.0).with_fees(0.0);
        let result = BasketSimulator::new().from_signals(&t, &config).unwrap();
        assert_eq!(result.trade_count(), 1);
        assert_relative_eq!(result.end_value, 12_000.0, epsilon = 1e-6);
        assert_eq!(result, simulate(&t, &config).unwrap());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let t = triple(&[100.0, 101.0], 0, 1);
        let err = BasketSimulator
            .from_signals(&t, &SimulationConfig::new(-1.0, 0.5))
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig { .. }));
    }
}
