//! Checks a script's bindings and repairs signal-table shapes.

use crate::domain::error::ValidationError;
use crate::domain::executor::Bindings;
use crate::domain::frame::{reconcile, Frame};
use crate::domain::script::value::{DType, Value};
use crate::domain::simulation::SignalTriple;

pub const REQUIRED_BINDINGS: [&str; 3] = ["close", "entries", "exits"];

fn wrong_type(name: &str, expected: &str, found: &Value) -> ValidationError {
    ValidationError::WrongType {
        name: name.to_string(),
        expected: expected.to_string(),
        found: found.describe(),
    }
}

fn close_frame(value: &Value) -> Result<Frame<f64>, ValidationError> {
    match value {
        Value::Table(t) if !t.is_series() && t.dtype == DType::Float => Ok(t.frame.clone()),
        other => Err(wrong_type("close", "a float DataFrame", other)),
    }
}

/// Bool tables as-is; numeric tables by truthiness, NaN as false.
fn signal_frame(name: &str, value: &Value) -> Result<Frame<bool>, ValidationError> {
    match value {
        Value::Table(t) if !t.is_series() => Ok(t.to_bools()),
        other => Err(wrong_type(name, "a boolean DataFrame", other)),
    }
}

/// Turn bindings into a simulation-ready triple.
///
/// Signal tables whose labels differ from `close` are reindexed onto it with
/// `false` fill. That repair is logged, never an error.
pub fn validate(bindings: &Bindings) -> Result<SignalTriple, ValidationError> {
    let names: Vec<String> = REQUIRED_BINDINGS
        .iter()
        .filter(|name| !bindings.contains(name))
        .map(|name| name.to_string())
        .collect();
    let (Some(close), Some(entries), Some(exits)) = (
        bindings.get("close"),
        bindings.get("entries"),
        bindings.get("exits"),
    ) else {
        return Err(ValidationError::MissingBinding { names });
    };

    let close = close_frame(close)?;
    let entries = signal_frame("entries", entries)?;
    let exits = signal_frame("exits", exits)?;

    let entries = repair("entries", entries, &close);
    let exits = repair("exits", exits, &close);
    Ok(SignalTriple {
        close,
        entries,
        exits,
    })
}

fn repair(name: &str, signals: Frame<bool>, close: &Frame<f64>) -> Frame<bool> {
    if signals.same_labels(close) {
        return signals;
    }
    log::info!(
        "fixing {name} shape mismatch: {:?} -> {:?}",
        signals.shape(),
        close.shape()
    );
    reconcile(&signals, close)
}
