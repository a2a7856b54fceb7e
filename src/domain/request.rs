//! The strategy request value and its lookback period and sampling interval.

use chrono::{Duration, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;
pub const DEFAULT_SIZE: f64 = 0.2;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("strategy prompt is empty")]
    EmptyPrompt,

    #[error("ticker universe is empty")]
    EmptyUniverse,

    #[error("initial cash must be positive, got {0}")]
    InvalidCash(f64),

    #[error("position size must be in (0, 1], got {0}")]
    InvalidSize(f64),

    #[error("max attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("invalid period '{0}' (expected e.g. 24mo, 24 months, 2y, 30d, max)")]
    InvalidPeriod(String),

    #[error("invalid interval '{0}' (expected 1d, 5d, 1wk, 1mo, 3mo)")]
    InvalidInterval(String),
}

/// Lookback window ending at the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Days(u32),
    Months(u32),
    Years(u32),
    Max,
}

impl Default for Period {
    fn default() -> Self {
        Period::Months(24)
    }
}

impl Period {
    /// First date inside the window that ends at `end`. `Max` has no bound.
    pub fn start_from(&self, end: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Period::Days(n) => end.checked_sub_signed(Duration::days(i64::from(n))),
            Period::Months(n) => end.checked_sub_months(Months::new(n)),
            Period::Years(n) => end.checked_sub_months(Months::new(n.saturating_mul(12))),
            Period::Max => None,
        }
    }
}

impl FromStr for Period {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        if text == "max" {
            return Ok(Period::Max);
        }
        let err = || RequestError::InvalidPeriod(s.to_string());
        let (count, unit) = split_count(&text).ok_or_else(err)?;
        match unit {
            "d" | "day" | "days" => Ok(Period::Days(count)),
            "mo" | "month" | "months" => Ok(Period::Months(count)),
            "y" | "yr" | "year" | "years" => Ok(Period::Years(count)),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Period {
    /// Renders as the range token the price feed expects.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Days(n) => write!(f, "{n}d"),
            Period::Months(n) => write!(f, "{n}mo"),
            Period::Years(n) => write!(f, "{n}y"),
            Period::Max => write!(f, "max"),
        }
    }
}

/// Bar spacing. Daily or coarser, since tables are indexed by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    Day,
    FiveDays,
    Week,
    Month,
    Quarter,
}

impl FromStr for Interval {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        let err = || RequestError::InvalidInterval(s.to_string());
        let (count, unit) = split_count(&text).ok_or_else(err)?;
        match (count, unit) {
            (1, "d" | "day") => Ok(Interval::Day),
            (5, "d" | "days") => Ok(Interval::FiveDays),
            (1, "wk" | "w" | "week") => Ok(Interval::Week),
            (1, "mo" | "month") => Ok(Interval::Month),
            (3, "mo" | "months") => Ok(Interval::Quarter),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Interval::Day => "1d",
            Interval::FiveDays => "5d",
            Interval::Week => "1wk",
            Interval::Month => "1mo",
            Interval::Quarter => "3mo",
        };
        f.write_str(token)
    }
}

/// Split `"24 months"` / `"24mo"` into `(24, "months")`. Count must be positive.
fn split_count(text: &str) -> Option<(u32, &str)> {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let count: u32 = text[..digits_end].parse().ok()?;
    if count == 0 {
        return None;
    }
    Some((count, text[digits_end..].trim()))
}

/// One backtest request. Immutable once validated.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRequest {
    pub prompt: String,
    pub tickers: Vec<String>,
    pub initial_cash: f64,
    pub size: f64,
    pub period: Period,
    pub interval: Interval,
    pub max_attempts: u32,
}

impl StrategyRequest {
    pub fn new(prompt: impl Into<String>, tickers: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tickers,
            initial_cash: DEFAULT_INITIAL_CASH,
            size: DEFAULT_SIZE,
            period: Period::default(),
            interval: Interval::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_initial_cash(mut self, cash: f64) -> Self {
        self.initial_cash = cash;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        if self.tickers.is_empty() {
            return Err(RequestError::EmptyUniverse);
        }
        if !(self.initial_cash > 0.0 && self.initial_cash.is_finite()) {
            return Err(RequestError::InvalidCash(self.initial_cash));
        }
        if !(self.size > 0.0 && self.size <= 1.0) {
            return Err(RequestError::InvalidSize(self.size));
        }
        if self.max_attempts == 0 {
            return Err(RequestError::InvalidMaxAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StrategyRequest {
        StrategyRequest::new("buy the dip", vec!["RELIANCE.NS".into()])
    }

    #[test]
    fn defaults() {
        let r = request();
        assert_eq!(r.initial_cash, 10_000.0);
        assert_eq!(r.size, 0.2);
        assert_eq!(r.period, Period::Months(24));
        assert_eq!(r.interval, Interval::Day);
        assert_eq!(r.max_attempts, 3);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let r = request()
            .with_initial_cash(50_000.0)
            .with_size(0.1)
            .with_period(Period::Years(1))
            .with_interval(Interval::Week)
            .with_max_attempts(5);
        assert_eq!(r.initial_cash, 50_000.0);
        assert_eq!(r.size, 0.1);
        assert_eq!(r.period, Period::Years(1));
        assert_eq!(r.interval, Interval::Week);
        assert_eq!(r.max_attempts, 5);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert_eq!(
            request().with_initial_cash(0.0).validate(),
            Err(RequestError::InvalidCash(0.0))
        );
        assert_eq!(
            request().with_size(1.5).validate(),
            Err(RequestError::InvalidSize(1.5))
        );
        assert_eq!(
            request().with_size(0.0).validate(),
            Err(RequestError::InvalidSize(0.0))
        );
        assert_eq!(
            request().with_max_attempts(0).validate(),
            Err(RequestError::InvalidMaxAttempts)
        );
        assert_eq!(
            StrategyRequest::new("  ", vec!["A".into()]).validate(),
            Err(RequestError::EmptyPrompt)
        );
        assert_eq!(
            StrategyRequest::new("x", vec![]).validate(),
            Err(RequestError::EmptyUniverse)
        );
    }

    #[test]
    fn size_of_one_is_allowed() {
        assert!(request().with_size(1.0).validate().is_ok());
    }

    #[test]
    fn period_parses_common_spellings() {
        assert_eq!("24mo".parse::<Period>().unwrap(), Period::Months(24));
        assert_eq!("24 months".parse::<Period>().unwrap(), Period::Months(24));
        assert_eq!("2y".parse::<Period>().unwrap(), Period::Years(2));
        assert_eq!("30d".parse::<Period>().unwrap(), Period::Days(30));
        assert_eq!("5 Days".parse::<Period>().unwrap(), Period::Days(5));
        assert_eq!("MAX".parse::<Period>().unwrap(), Period::Max);
    }

    #[test]
    fn period_rejects_garbage() {
        assert!("".parse::<Period>().is_err());
        assert!("0mo".parse::<Period>().is_err());
        assert!("24 fortnights".parse::<Period>().is_err());
        assert!("months".parse::<Period>().is_err());
    }

    #[test]
    fn period_renders_range_token() {
        assert_eq!(Period::Months(24).to_string(), "24mo");
        assert_eq!(Period::Years(2).to_string(), "2y");
        assert_eq!(Period::Days(30).to_string(), "30d");
        assert_eq!(Period::Max.to_string(), "max");
    }

    #[test]
    fn period_start_from() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            Period::Months(1).start_from(end),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            Period::Years(2).start_from(end),
            NaiveDate::from_ymd_opt(2022, 3, 31)
        );
        assert_eq!(
            Period::Days(10).start_from(end),
            NaiveDate::from_ymd_opt(2024, 3, 21)
        );
        assert_eq!(Period::Max.start_from(end), None);
    }

    #[test]
    fn interval_parses_and_renders() {
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::Day);
        assert_eq!("1 day".parse::<Interval>().unwrap(), Interval::Day);
        assert_eq!("5d".parse::<Interval>().unwrap(), Interval::FiveDays);
        assert_eq!("1 week".parse::<Interval>().unwrap(), Interval::Week);
        assert_eq!("1wk".parse::<Interval>().unwrap(), Interval::Week);
        assert_eq!("1 month".parse::<Interval>().unwrap(), Interval::Month);
        assert_eq!("3mo".parse::<Interval>().unwrap(), Interval::Quarter);
        assert_eq!(Interval::Week.to_string(), "1wk");
        assert_eq!(Interval::Quarter.to_string(), "3mo");
    }

    #[test]
    fn interval_rejects_intraday() {
        assert!(matches!(
            "1h".parse::<Interval>(),
            Err(RequestError::InvalidInterval(_))
        ));
        assert!("15m".parse::<Interval>().is_err());
    }
}
