//! Configuration validation.
//!
//! Every key is optional and falls back to a default; keys that are present
//! must hold usable values. Runs before any network or model access.

use crate::domain::error::AppError;
use crate::domain::request::{Interval, Period};
use crate::ports::config_port::ConfigPort;

pub const DATA_SOURCES: [&str; 2] = ["yahoo", "csv"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), AppError> {
    validate_llm_config(config)?;
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AppError {
    AppError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A key that, when present, must not be blank.
fn non_blank(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), AppError> {
    match config.get_string(section, key) {
        Some(s) if s.trim().is_empty() => Err(invalid(section, key, format!("{key} must not be empty"))),
        _ => Ok(()),
    }
}

pub fn validate_llm_config(config: &dyn ConfigPort) -> Result<(), AppError> {
    if let Some(endpoint) = config.get_string("llm", "endpoint") {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(invalid("llm", "endpoint", "endpoint must be an http(s) URL"));
        }
    }
    non_blank(config, "llm", "model")?;
    non_blank(config, "llm", "api_key_env")?;
    if config.get_string("llm", "timeout_secs").is_some() && config.get_int("llm", "timeout_secs", 0) < 1 {
        return Err(invalid("llm", "timeout_secs", "timeout_secs must be a positive integer"));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), AppError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "yahoo".to_string());
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(invalid(
            "data",
            "source",
            format!("source must be one of {}", DATA_SOURCES.join(", ")),
        ));
    }
    if source == "csv" {
        match config.get_string("data", "csv_dir") {
            Some(dir) if !dir.trim().is_empty() => {}
            _ => {
                return Err(AppError::ConfigMissing {
                    section: "data".to_string(),
                    key: "csv_dir".to_string(),
                });
            }
        }
    }
    non_blank(config, "data", "universe_csv")?;
    non_blank(config, "data", "symbol_column")?;
    non_blank(config, "data", "benchmark_symbol")?;
    if let Some(suffix) = config.get_string("data", "exchange_suffix") {
        let suffix = suffix.trim();
        if !suffix.is_empty() && !suffix.starts_with('.') {
            return Err(invalid("data", "exchange_suffix", "exchange_suffix must start with '.'"));
        }
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), AppError> {
    if config.get_string("backtest", "initial_cash").is_some() {
        let cash = config.get_double("backtest", "initial_cash", 0.0);
        if cash <= 0.0 {
            return Err(invalid("backtest", "initial_cash", "initial_cash must be positive"));
        }
    }
    if config.get_string("backtest", "size").is_some() {
        let size = config.get_double("backtest", "size", 0.0);
        if size <= 0.0 || size > 1.0 {
            return Err(invalid("backtest", "size", "size must be between 0 and 1"));
        }
    }
    if let Some(period) = config.get_string("backtest", "period") {
        period
            .parse::<Period>()
            .map_err(|e| invalid("backtest", "period", e.to_string()))?;
    }
    if let Some(interval) = config.get_string("backtest", "interval") {
        interval
            .parse::<Interval>()
            .map_err(|e| invalid("backtest", "interval", e.to_string()))?;
    }
    if config.get_string("backtest", "max_attempts").is_some()
        && config.get_int("backtest", "max_attempts", 0) < 1
    {
        return Err(invalid("backtest", "max_attempts", "max_attempts must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert!(validate_config(&make_config("")).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[llm]
endpoint = https://api.openai.com/v1/chat/completions
model = o4-mini
api_key_env = OPENAI_API_KEY
timeout_secs = 120

[data]
source = csv
csv_dir = ./prices
universe_csv = ind_nifty500list.csv
symbol_column = Symbol
exchange_suffix = .NS
benchmark_symbol = ^CRSLDX

[backtest]
initial_cash = 10000
size = 0.2
period = 24 months
interval = 1 day
max_attempts = 3
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn endpoint_must_be_url() {
        let err = validate_config(&make_config("[llm]\nendpoint = api.openai.com\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "endpoint"));
    }

    #[test]
    fn timeout_must_be_positive() {
        let err = validate_config(&make_config("[llm]\ntimeout_secs = 0\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "timeout_secs"));
    }

    #[test]
    fn unknown_source_fails() {
        let err = validate_config(&make_config("[data]\nsource = postgres\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "source"));
    }

    #[test]
    fn csv_source_needs_directory() {
        let err = validate_config(&make_config("[data]\nsource = csv\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigMissing { key, .. } if key == "csv_dir"));
    }

    #[test]
    fn suffix_needs_leading_dot() {
        let err = validate_config(&make_config("[data]\nexchange_suffix = NS\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "exchange_suffix"));
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let err = validate_config(&make_config("[backtest]\ninitial_cash = -5\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn size_above_one_fails() {
        let err = validate_config(&make_config("[backtest]\nsize = 1.5\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "size"));
    }

    #[test]
    fn intraday_interval_fails() {
        let err = validate_config(&make_config("[backtest]\ninterval = 1h\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "interval"));
    }

    #[test]
    fn bad_period_fails() {
        let err = validate_config(&make_config("[backtest]\nperiod = forever\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "period"));
    }

    #[test]
    fn max_attempts_zero_fails() {
        let err = validate_config(&make_config("[backtest]\nmax_attempts = 0\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid { key, .. } if key == "max_attempts"));
    }
}
