#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::cell::RefCell;
use strategen::domain::error::{CodeGenError, DataError};
use strategen::domain::frame::{Frame, Panel};
use strategen::domain::request::{Interval, Period};
use strategen::ports::codegen_port::CodeGenPort;
use strategen::ports::market_data_port::MarketDataPort;

/// Serves canned completions in order and records every prompt it saw.
pub struct MockCodeGen {
    replies: RefCell<Vec<Result<String, CodeGenError>>>,
    pub prompts: RefCell<Vec<String>>,
}

impl MockCodeGen {
    pub fn new() -> Self {
        Self {
            replies: RefCell::new(Vec::new()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn with_reply(self, code: &str) -> Self {
        self.replies.borrow_mut().push(Ok(code.to_string()));
        self
    }

    pub fn with_error(self, err: CodeGenError) -> Self {
        self.replies.borrow_mut().push(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn prompt(&self, n: usize) -> String {
        self.prompts.borrow()[n].clone()
    }
}

impl CodeGenPort for MockCodeGen {
    fn generate(&self, prompt: &str) -> Result<String, CodeGenError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let mut replies = self.replies.borrow_mut();
        if replies.is_empty() {
            return Err(CodeGenError::ReplayExhausted {
                served: self.prompts.borrow().len() - 1,
            });
        }
        replies.remove(0)
    }
}

/// In-memory price store keyed by symbol.
pub struct MockMarketData {
    frames: Vec<(String, Frame<f64>)>,
    pub requests: RefCell<Vec<Vec<String>>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Add a symbol whose bars follow `close`, with Open/High/Low around it.
    pub fn with_symbol(mut self, symbol: &str, close: &[f64]) -> Self {
        self.frames.push((symbol.to_string(), ohlcv_frame(close)));
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn download(
        &self,
        symbols: &[String],
        _period: Period,
        _interval: Interval,
    ) -> Result<Panel, DataError> {
        self.requests.borrow_mut().push(symbols.to_vec());
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for symbol in symbols {
            match self.frames.iter().find(|(s, _)| s == symbol) {
                Some((s, f)) => found.push((s.clone(), f.clone())),
                None => missing.push(symbol.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(DataError::PricesMissing { symbols: missing });
        }
        Ok(Panel::from_symbol_frames(found).unwrap())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dates(count: usize) -> Vec<NaiveDate> {
    let start = date(2023, 1, 2);
    (0..count).map(|i| start + Duration::days(i as i64)).collect()
}

pub fn ohlcv_frame(close: &[f64]) -> Frame<f64> {
    let columns = vec![
        ("Open".to_string(), close.iter().map(|c| c - 0.5).collect()),
        ("High".to_string(), close.iter().map(|c| c + 1.0).collect()),
        ("Low".to_string(), close.iter().map(|c| c - 1.0).collect()),
        ("Close".to_string(), close.to_vec()),
        ("Volume".to_string(), vec![1000.0; close.len()]),
    ];
    Frame::from_columns(dates(close.len()), columns).unwrap()
}

/// A rise, a dip, then a rise again: enough for crossovers to fire.
pub fn wave_prices(count: usize, start: f64) -> Vec<f64> {
    (0..count)
        .map(|i| start + 10.0 * ((i as f64) / 8.0).sin() + i as f64 * 0.2)
        .collect()
}

pub fn market_with(symbols: &[&str], count: usize) -> MockMarketData {
    symbols
        .iter()
        .enumerate()
        .fold(MockMarketData::new(), |m, (k, s)| {
            m.with_symbol(s, &wave_prices(count, 100.0 + 50.0 * k as f64))
        })
}

pub fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub const MA_CROSS: &str = "close = raw.xs('Close', axis=1, level=1)
fast = close.rolling(5).mean()
slow = close.rolling(20).mean()
entries = (fast > slow) & (fast.shift(1) <= slow.shift(1))
exits = (fast < slow) & (fast.shift(1) >= slow.shift(1))";
