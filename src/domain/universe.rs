//! Ticker universe: symbol normalization and membership checks.
//!
//! Symbols are uppercased, deduplicated in first-seen order, and given the
//! exchange suffix (e.g. `.NS`) when they do not already carry it. Index
//! symbols (leading `^`) are never suffixed.

use std::collections::HashSet;

pub const DEFAULT_EXCHANGE_SUFFIX: &str = ".NS";

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub symbols: Vec<String>,
}

impl Universe {
    /// Build from raw symbols, normalizing each one.
    pub fn from_raw<I, S>(raw: I, suffix: &str) -> Result<Self, UniverseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = normalize_symbols(raw, suffix);
        if symbols.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(Self { symbols })
    }

    pub fn count(&self) -> usize {
        self.symbols.len()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Symbols from `columns` that are not part of this universe.
    pub fn outsiders<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        let members: HashSet<&str> = self.symbols.iter().map(String::as_str).collect();
        columns
            .iter()
            .map(String::as_str)
            .filter(|c| !members.contains(c))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("ticker universe is empty")]
    Empty,

    #[error("ticker list has no '{column}' column")]
    MissingColumn { column: String },

    #[error("failed to read ticker list {path}: {reason}")]
    Read { path: String, reason: String },
}

/// Uppercase, suffix, and dedupe symbols. Blank entries are skipped.
pub fn normalize_symbols<I, S>(raw: I, suffix: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in raw {
        let trimmed = item.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let symbol = apply_suffix(&trimmed.to_uppercase(), suffix);
        if seen.insert(symbol.clone()) {
            out.push(symbol);
        }
    }
    out
}

fn apply_suffix(symbol: &str, suffix: &str) -> String {
    let suffix = suffix.to_uppercase();
    if suffix.is_empty() || symbol.starts_with('^') || symbol.ends_with(&suffix) {
        symbol.to_string()
    } else {
        format!("{symbol}{suffix}")
    }
}

/// Parse a comma-separated symbol list given on the command line. Unlike
/// [`normalize_symbols`] this is strict: blanks and repeats are errors.
pub fn parse_symbols(input: &str, suffix: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = apply_suffix(&trimmed.to_uppercase(), suffix);
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}
