//! Port traits: the seams between domain logic and the outside world.

pub mod codegen_port;
pub mod config_port;
pub mod market_data_port;
pub mod simulation_port;
pub mod universe_port;

pub use codegen_port::CodeGenPort;
pub use config_port::ConfigPort;
pub use market_data_port::MarketDataPort;
pub use simulation_port::SimulationPort;
pub use universe_port::UniversePort;
