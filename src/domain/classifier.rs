//! Maps raw fault messages onto actionable categories with remediation hints.
//!
//! Classification is substring matching over the message text, evaluated as
//! an ordered rule list. The first matching rule wins.

use std::fmt;

use crate::domain::error::PRICES_MISSING_MARKER;

pub const DEFAULT_BENCHMARK_SYMBOL: &str = "^CRSLDX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    ShapeMismatch,
    IndexingError,
    DataUnavailable,
    SyntaxError,
    Other,
}

impl ErrorCategory {
    /// Heading used when the error is fed back to the model.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ShapeMismatch => "Shape mismatch error",
            ErrorCategory::IndexingError => "Indexing error",
            ErrorCategory::DataUnavailable => "Invalid ticker symbol",
            ErrorCategory::SyntaxError => "Syntax error",
            ErrorCategory::Other => "Error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::ShapeMismatch => "ShapeMismatch",
            ErrorCategory::IndexingError => "IndexingError",
            ErrorCategory::DataUnavailable => "DataUnavailable",
            ErrorCategory::SyntaxError => "SyntaxError",
            ErrorCategory::Other => "Other",
        };
        f.write_str(name)
    }
}

/// A failed attempt's fault, categorized for the next prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
    pub hint: Option<String>,
}

impl ClassifiedError {
    /// Text appended to the retry prompt: heading, raw message, then hint.
    pub fn feedback(&self) -> String {
        let mut text = format!("{}: {}", self.category.label(), self.message);
        if let Some(hint) = &self.hint {
            text.push('\n');
            text.push_str(hint);
        }
        text
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.feedback())
    }
}

struct ClassificationRule {
    category: ErrorCategory,
    matches: fn(&str) -> bool,
}

const RULES: [ClassificationRule; 4] = [
    ClassificationRule {
        category: ErrorCategory::ShapeMismatch,
        matches: is_shape_mismatch,
    },
    ClassificationRule {
        category: ErrorCategory::IndexingError,
        matches: is_missing_labels,
    },
    ClassificationRule {
        category: ErrorCategory::DataUnavailable,
        matches: is_missing_prices,
    },
    ClassificationRule {
        category: ErrorCategory::SyntaxError,
        matches: is_syntax_error,
    },
];

fn is_shape_mismatch(m: &str) -> bool {
    m.contains("shape") && m.contains("doesn't match")
}

fn is_missing_labels(m: &str) -> bool {
    m.contains("KeyError") && m.contains("None of")
}

fn is_missing_prices(m: &str) -> bool {
    m.contains("No data found") || m.contains(PRICES_MISSING_MARKER)
}

fn is_syntax_error(m: &str) -> bool {
    m.contains("SyntaxError")
}

const SHAPE_HINT: &str = "Ensure entries and exits have the same shape as close by adding:\n\
entries = entries.reindex(index=close.index, columns=close.columns, fill_value=False)\n\
exits = exits.reindex(index=close.index, columns=close.columns, fill_value=False)";

const INDEXING_HINT: &str = "Avoid .loc[] with a boolean series as row labels. Use elementwise \
masking instead: entries = condition.multiply(mask, axis=0) applies a per-date mask across every column.";

const SYNTAX_HINT: &str = "Do not call methods on numeric literals: write 100 / (1 + rs), \
not 100.div(1 + rs). Use the standard operators + - * / and no loops, def or lambda.";

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorClassifier {
    benchmark_symbol: String,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BENCHMARK_SYMBOL)
    }
}

impl ErrorClassifier {
    pub fn new(benchmark_symbol: impl Into<String>) -> Self {
        Self {
            benchmark_symbol: benchmark_symbol.into(),
        }
    }

    pub fn benchmark_symbol(&self) -> &str {
        &self.benchmark_symbol
    }

    pub fn classify(&self, message: &str) -> ClassifiedError {
        let category = RULES
            .iter()
            .find(|rule| (rule.matches)(message))
            .map(|rule| rule.category)
            .unwrap_or(ErrorCategory::Other);

        ClassifiedError {
            category,
            message: message.to_string(),
            hint: self.hint(category),
        }
    }

    fn hint(&self, category: ErrorCategory) -> Option<String> {
        match category {
            ErrorCategory::ShapeMismatch => Some(SHAPE_HINT.to_string()),
            ErrorCategory::IndexingError => Some(INDEXING_HINT.to_string()),
            ErrorCategory::DataUnavailable => Some(format!(
                "Use '{}' for benchmark index data, not other symbols.",
                self.benchmark_symbol
            )),
            ErrorCategory::SyntaxError => Some(SYNTAX_HINT.to_string()),
            ErrorCategory::Other => None,
        }
    }
}
