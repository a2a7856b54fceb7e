//! Yahoo Finance chart API client.

use crate::domain::error::DataError;
use crate::domain::frame::{Frame, PRICE_FIELDS, Panel};
use crate::domain::request::{Interval, Period};
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new(timeout: Option<Duration>) -> Result<Self, DataError> {
        let mut builder = reqwest::blocking::Client::builder().user_agent("Mozilla/5.0");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| DataError::Request {
            reason: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One symbol's bars. `Ok(None)` when the feed has nothing for it.
    fn fetch(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Option<Frame<f64>>, DataError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            symbol.replace('^', "%5E")
        );
        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", period.to_string()),
                ("interval", interval.to_string()),
            ])
            .send()
            .map_err(|e| DataError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().map_err(|e| DataError::Request {
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(DataError::Request {
                reason: format!("HTTP {status} for {symbol}"),
            });
        }
        parse_chart(symbol, &body)
    }
}

impl MarketDataPort for YahooAdapter {
    fn download(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Panel, DataError> {
        let mut frames = Vec::with_capacity(symbols.len());
        let mut missing = Vec::new();
        for symbol in symbols {
            match self.fetch(symbol, period, interval)? {
                Some(frame) => frames.push((symbol.clone(), frame)),
                None => {
                    log::warn!("no price data for {symbol}");
                    missing.push(symbol.clone());
                }
            }
        }
        if !missing.is_empty() {
            return Err(DataError::PricesMissing { symbols: missing });
        }
        Panel::from_symbol_frames(frames).map_err(|e| DataError::Malformed {
            symbol: symbols.join(", "),
            reason: e.to_string(),
        })
    }
}

/// Decode a chart response into a field-columned frame. Bars sharing a
/// date keep the latest one; null prices become NaN.
fn parse_chart(symbol: &str, body: &str) -> Result<Option<Frame<f64>>, DataError> {
    let malformed = |reason: String| DataError::Malformed {
        symbol: symbol.to_string(),
        reason,
    };
    let parsed: ChartResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid chart response: {e}")))?;
    let Some(result) = parsed.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Ok(None);
    }
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let series = [
        &quote.open,
        &quote.high,
        &quote.low,
        &quote.close,
        &quote.volume,
    ];

    let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| malformed(format!("invalid timestamp {ts}")))?
            .date_naive();
        let values = series
            .iter()
            .map(|s| s.get(i).copied().flatten().unwrap_or(f64::NAN))
            .collect();
        match rows.last_mut() {
            Some((last, prev)) if *last == date => *prev = values,
            _ => rows.push((date, values)),
        }
    }
    rows.sort_by_key(|(d, _)| *d);
    rows.dedup_by_key(|(d, _)| *d);

    let index = rows.iter().map(|(d, _)| *d).collect();
    let columns = PRICE_FIELDS.iter().map(|f| f.to_string()).collect();
    let values = rows.into_iter().flat_map(|(_, v)| v).collect();
    Frame::new(index, columns, values)
        .map(Some)
        .map_err(|e| malformed(e.to_string()))
}
