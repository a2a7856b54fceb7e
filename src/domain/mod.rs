//! Core domain types and logic.

pub mod auto_backtest;
pub mod classifier;
pub mod config_validation;
pub mod controller;
pub mod error;
pub mod execution;
pub mod executor;
pub mod fallback;
pub mod frame;
pub mod metrics;
pub mod portfolio;
pub mod position;
pub mod prompt;
pub mod request;
pub mod sanitizer;
pub mod script;
pub mod simulation;
pub mod universe;
pub mod validator;
