//! End-to-end pipeline: universe, prices, then the retry loop.

use crate::domain::classifier::ErrorClassifier;
use crate::domain::controller::{BacktestOutcome, RetryController};
use crate::domain::error::{AppError, DataError};
use crate::domain::executor::Capabilities;
use crate::domain::prompt::PromptBuilder;
use crate::domain::request::StrategyRequest;
use crate::domain::simulation::SimulationConfig;
use crate::domain::universe::{Universe, UniverseError};
use crate::ports::codegen_port::CodeGenPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::simulation_port::SimulationPort;
use crate::ports::universe_port::UniversePort;

/// Load and normalize the ticker universe.
pub fn load_universe(port: &dyn UniversePort, suffix: &str) -> Result<Universe, UniverseError> {
    let raw = port.load_symbols()?;
    let universe = Universe::from_raw(raw, suffix)?;
    log::info!("loaded {} symbols", universe.count());
    Ok(universe)
}

pub struct AutoBacktest<'a> {
    market: &'a dyn MarketDataPort,
    codegen: &'a dyn CodeGenPort,
    simulator: &'a dyn SimulationPort,
    benchmark_symbol: String,
}

impl<'a> AutoBacktest<'a> {
    pub fn new(
        market: &'a dyn MarketDataPort,
        codegen: &'a dyn CodeGenPort,
        simulator: &'a dyn SimulationPort,
    ) -> Self {
        Self {
            market,
            codegen,
            simulator,
            benchmark_symbol: crate::domain::classifier::DEFAULT_BENCHMARK_SYMBOL.to_string(),
        }
    }

    pub fn with_benchmark_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark_symbol = symbol.into();
        self
    }

    /// Download prices for the request's tickers and run the retry loop over
    /// them. Price-fetch failures here are not retried.
    pub fn run(&self, request: &StrategyRequest) -> Result<BacktestOutcome, AppError> {
        request.validate()?;
        log::info!(
            "downloading {} symbols, period {}, interval {}",
            request.tickers.len(),
            request.period,
            request.interval
        );
        let raw = self
            .market
            .download(&request.tickers, request.period, request.interval)?;

        let universe = Universe {
            symbols: request.tickers.clone(),
        };
        let outsiders = universe.outsiders(raw.symbols());
        if !outsiders.is_empty() {
            return Err(DataError::OutsideUniverse {
                symbols: outsiders.iter().map(|s| s.to_string()).collect(),
            }
            .into());
        }
        log::info!(
            "price panel has {} rows x {} symbols",
            raw.index().len(),
            raw.symbols().len()
        );

        let config = SimulationConfig::new(request.initial_cash, request.size);
        let caps = Capabilities::tables()
            .with_market(self.market, request.period, request.interval)
            .with_sim(self.simulator, config.clone());
        let prompts = PromptBuilder::new(self.benchmark_symbol.clone())
            .with_data_window(request.period, request.interval);
        let classifier = ErrorClassifier::new(self.benchmark_symbol.clone());

        RetryController::new(self.codegen, self.simulator, &caps)
            .with_prompts(prompts)
            .with_classifier(classifier)
            .run(&request.prompt, &raw, &config, request.max_attempts)
    }
}
