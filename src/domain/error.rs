//! Domain error types.
//!
//! Script faults render with Python-style exception prefixes (`SyntaxError:`,
//! `KeyError:`, `ValueError:`). The error classifier matches on this text, so
//! changing a message here can change its category.

use crate::domain::frame::FrameError;

/// A syntax error in signal script, with byte offset into the source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    pub line: usize,
}

impl ParseError {
    /// Format the error with the offending source line and a caret under the
    /// error column.
    pub fn display_with_context(&self, input: &str) -> String {
        let line_start = input[..self.position.min(input.len())]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line_end = input[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(input.len());
        let column = self.position.saturating_sub(line_start);
        let caret = " ".repeat(column) + "^";
        format!(
            "{line}\n{caret}\nSyntaxError: {err}",
            line = &input[line_start..line_end],
            caret = caret,
            err = self
        )
    }
}

/// Which label axis a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAxis {
    Index,
    Columns,
}

impl std::fmt::Display for LabelAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelAxis::Index => write!(f, "index"),
            LabelAxis::Columns => write!(f, "columns"),
        }
    }
}

/// A fault raised while interpreting signal script.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("SyntaxError: {0}")]
    Syntax(#[from] ParseError),

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("ValueError: operands could not be aligned: shape {left} doesn't match {right}")]
    ShapeMismatch { left: String, right: String },

    #[error("KeyError: None of [{}] are in the [{axis}]", quote_labels(.labels))]
    Key { labels: Vec<String>, axis: LabelAxis },

    #[error("AttributeError: '{type_name}' object has no attribute '{attr}'")]
    Attribute { type_name: String, attr: String },

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

fn quote_labels(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("'{l}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<FrameError> for ScriptError {
    fn from(err: FrameError) -> Self {
        ScriptError::Value(err.to_string())
    }
}

/// Marker carried by every missing-price failure.
pub const PRICES_MISSING_MARKER: &str = "PricesMissingError";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("PricesMissingError: No data found for {}, symbol may be delisted", .symbols.join(", "))]
    PricesMissing { symbols: Vec<String> },

    #[error("price request failed: {reason}")]
    Request { reason: String },

    #[error("malformed price data for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("symbols {symbols:?} are not in the requested universe")]
    OutsideUniverse { symbols: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("ValueError: simulation needs at least one row and one column, got shape ({rows}, {cols})")]
    Empty { rows: usize, cols: usize },

    #[error("ValueError: {name} shape ({}, {}) doesn't match close shape ({}, {})", .signals.0, .signals.1, .close.0, .close.1)]
    ShapeMismatch {
        name: String,
        signals: (usize, usize),
        close: (usize, usize),
    },

    #[error("ValueError: invalid simulation setting {key}: {reason}")]
    InvalidConfig { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("generated code must define 'close', 'entries', and 'exits' (missing: {})", .names.join(", "))]
    MissingBinding { names: Vec<String> },

    #[error("'{name}' must be {expected}, found {found}")]
    WrongType {
        name: String,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodeGenError {
    #[error("missing API key: set the {var} environment variable")]
    MissingApiKey { var: String },

    #[error("code generation request failed: {reason}")]
    Request { reason: String },

    #[error("code generation returned no completion text")]
    EmptyCompletion,

    #[error("no script left to replay after {served} attempt(s)")]
    ReplayExhausted { served: usize },

    #[error("failed to read script {path}: {reason}")]
    Read { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FallbackError {
    #[error("price table has no Close field")]
    MissingClose,

    #[error("price table has {rows} rows, fallback needs at least {required}")]
    InsufficientRows { rows: usize, required: usize },

    #[error("price table has no columns")]
    NoColumns,
}

/// Top-level error type for strategen.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Request(#[from] crate::domain::request::RequestError),

    #[error(transparent)]
    Universe(#[from] crate::domain::universe::UniverseError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    CodeGen(#[from] CodeGenError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to generate valid code after {attempts} attempts.\nLast error:\n{last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit status for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            AppError::Io(_) => 1,
            AppError::ConfigParse { .. }
            | AppError::ConfigMissing { .. }
            | AppError::ConfigInvalid { .. }
            | AppError::Request(_) => 2,
            AppError::Universe(_) | AppError::Data(_) => 3,
            AppError::CodeGen(_) => 4,
            AppError::Script(_) | AppError::Validation(_) | AppError::Simulation(_) => 5,
            AppError::ExhaustedRetries { .. } => 6,
        }
    }
}

impl From<&AppError> for std::process::ExitCode {
    fn from(err: &AppError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context_points_at_column() {
        let src = "close = 1\nrsi = 100 - 100.div(x)\n";
        let err = ParseError {
            message: "invalid decimal literal".into(),
            position: src.find("100.div").unwrap() + 4,
            line: 2,
        };
        let rendered = err.display_with_context(src);
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("rsi = 100 - 100.div(x)"));
        assert_eq!(lines.next(), Some("                ^"));
        assert_eq!(
            lines.next(),
            Some("SyntaxError: invalid decimal literal (line 2)")
        );
    }

    #[test]
    fn syntax_error_message_has_python_prefix() {
        let err = ScriptError::from(ParseError {
            message: "'for' loops are not allowed".into(),
            position: 0,
            line: 1,
        });
        assert_eq!(
            err.to_string(),
            "SyntaxError: 'for' loops are not allowed (line 1)"
        );
    }

    #[test]
    fn shape_mismatch_message_matches_classifier_terms() {
        let err = ScriptError::ShapeMismatch {
            left: "(300, 5)".into(),
            right: "(300, 3)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shape"));
        assert!(msg.contains("doesn't match"));
    }

    #[test]
    fn key_error_lists_labels_and_axis() {
        let err = ScriptError::Key {
            labels: vec!["A".into(), "B".into()],
            axis: LabelAxis::Columns,
        };
        assert_eq!(
            err.to_string(),
            "KeyError: None of ['A', 'B'] are in the [columns]"
        );
    }

    #[test]
    fn prices_missing_carries_marker() {
        let err = DataError::PricesMissing {
            symbols: vec!["^NSE500".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains(PRICES_MISSING_MARKER));
        assert!(msg.contains("No data found"));
    }

    #[test]
    fn exit_codes_per_category() {
        let cases: Vec<(AppError, u8)> = vec![
            (
                AppError::ConfigMissing {
                    section: "llm".into(),
                    key: "model".into(),
                },
                2,
            ),
            (
                AppError::Data(DataError::PricesMissing { symbols: vec![] }),
                3,
            ),
            (
                AppError::CodeGen(CodeGenError::EmptyCompletion),
                4,
            ),
            (
                AppError::ExhaustedRetries {
                    attempts: 3,
                    last_error: "x".into(),
                },
                6,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.exit_status(), expected, "{err}");
        }
    }
}
