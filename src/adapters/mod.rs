//! Concrete adapter implementations for ports.

pub mod basket_simulator;
pub mod csv_adapter;
pub mod file_config_adapter;
#[cfg(feature = "http")]
pub mod openai_adapter;
pub mod script_file_adapter;
#[cfg(feature = "http")]
pub mod yahoo_adapter;
