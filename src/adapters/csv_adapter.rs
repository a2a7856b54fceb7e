//! CSV file adapters: the ticker universe list and a directory of price files.
//!
//! Price files are named `{symbol}.csv` (e.g. `RELIANCE.NS.csv`) with a
//! `Date` column followed by any of `Open`, `High`, `Low`, `Close`, `Volume`.
//! Blank cells read as NaN.

use crate::domain::error::DataError;
use crate::domain::frame::{Frame, PRICE_FIELDS, Panel};
use crate::domain::request::{Interval, Period};
use crate::domain::universe::UniverseError;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::universe_port::UniversePort;
use chrono::{Datelike, NaiveDate};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_SYMBOL_COLUMN: &str = "Symbol";

/// Ticker list read from one column of a CSV file.
pub struct CsvUniverseAdapter {
    path: PathBuf,
    column: String,
}

impl CsvUniverseAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            column: DEFAULT_SYMBOL_COLUMN.to_string(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    fn read_error(&self, reason: impl ToString) -> UniverseError {
        UniverseError::Read {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl UniversePort for CsvUniverseAdapter {
    fn load_symbols(&self) -> Result<Vec<String>, UniverseError> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| self.read_error(e))?;
        let col = headers
            .iter()
            .position(|h| h.trim() == self.column)
            .ok_or_else(|| UniverseError::MissingColumn {
                column: self.column.clone(),
            })?;

        let mut symbols = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| self.read_error(e))?;
            if let Some(symbol) = record.get(col) {
                symbols.push(symbol.to_string());
            }
        }
        Ok(symbols)
    }
}

/// Historical prices stored as one CSV file per symbol.
pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Read one symbol's file. `Ok(None)` when the file does not exist or
    /// holds no rows.
    fn read_symbol(&self, symbol: &str) -> Result<Option<Frame<f64>>, DataError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| DataError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let malformed = |reason: String| DataError::Malformed {
            symbol: symbol.to_string(),
            reason,
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| malformed(format!("CSV parse error: {e}")))?
            .clone();
        let date_col = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("date"))
            .ok_or_else(|| malformed("missing Date column".into()))?;
        let fields: Vec<(usize, &str)> = PRICE_FIELDS
            .iter()
            .filter_map(|name| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name))
                    .map(|pos| (pos, *name))
            })
            .collect();
        if fields.is_empty() {
            return Err(malformed("no price columns".into()));
        }

        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| malformed(format!("CSV parse error: {e}")))?;
            let date_str = record.get(date_col).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| malformed(format!("invalid date '{date_str}': {e}")))?;

            let mut values = Vec::with_capacity(fields.len());
            for (pos, name) in &fields {
                let cell = record.get(*pos).unwrap_or("").trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>()
                        .map_err(|e| malformed(format!("invalid {name} '{cell}': {e}")))?
                };
                values.push(value);
            }
            rows.push((date, values));
        }
        if rows.is_empty() {
            return Ok(None);
        }
        rows.sort_by_key(|(date, _)| *date);
        rows.dedup_by_key(|(date, _)| *date);

        let index = rows.iter().map(|(d, _)| *d).collect();
        let columns = fields.iter().map(|(_, n)| n.to_string()).collect();
        let values = rows.into_iter().flat_map(|(_, v)| v).collect();
        Frame::new(index, columns, values)
            .map(Some)
            .map_err(|e| malformed(e.to_string()))
    }
}

impl MarketDataPort for CsvPriceAdapter {
    fn download(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Panel, DataError> {
        let mut frames = Vec::with_capacity(symbols.len());
        let mut missing = Vec::new();
        for symbol in symbols {
            match self.read_symbol(symbol)? {
                Some(frame) => {
                    let frame = resample(&within_period(&frame, period), interval);
                    if frame.is_empty() {
                        missing.push(symbol.clone());
                    } else {
                        frames.push((symbol.clone(), frame));
                    }
                }
                None => missing.push(symbol.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(DataError::PricesMissing { symbols: missing });
        }
        log::debug!("read {} price files from {}", frames.len(), self.base_path.display());
        Panel::from_symbol_frames(frames).map_err(|e| DataError::Malformed {
            symbol: symbols.join(", "),
            reason: e.to_string(),
        })
    }
}

/// Rows inside `period`, counted back from the file's last date.
fn within_period(frame: &Frame<f64>, period: Period) -> Frame<f64> {
    let Some(&last) = frame.index().last() else {
        return frame.clone();
    };
    let Some(start) = period.start_from(last) else {
        return frame.clone();
    };
    let keep: Vec<usize> = frame
        .index()
        .iter()
        .enumerate()
        .filter(|(_, d)| **d > start)
        .map(|(i, _)| i)
        .collect();
    frame.select_rows(&keep)
}

/// Collapse daily bars into `interval` buckets, labelled by each bucket's
/// last date. Open takes the first value, High the max, Low the min, Close
/// the last, Volume the sum.
fn resample(frame: &Frame<f64>, interval: Interval) -> Frame<f64> {
    if interval == Interval::Day || frame.is_empty() {
        return frame.clone();
    }
    let index = frame.index();
    let bucket = |row: usize| -> i64 {
        let d = index[row];
        match interval {
            Interval::Day => row as i64,
            Interval::FiveDays => (row / 5) as i64,
            Interval::Week => {
                let w = d.iso_week();
                i64::from(w.year()) * 100 + i64::from(w.week())
            }
            Interval::Month => i64::from(d.year()) * 12 + i64::from(d.month0()),
            Interval::Quarter => i64::from(d.year()) * 4 + i64::from(d.month0() / 3),
        }
    };

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current = None;
    for row in 0..index.len() {
        let key = bucket(row);
        if current != Some(key) {
            groups.push(Vec::new());
            current = Some(key);
        }
        if let Some(group) = groups.last_mut() {
            group.push(row);
        }
    }

    let new_index = groups.iter().map(|g| index[g[g.len() - 1]]).collect();
    let mut columns = Vec::with_capacity(frame.columns().len());
    for (ci, name) in frame.columns().iter().enumerate() {
        let col = frame.column(ci);
        let values = groups
            .iter()
            .map(|g| {
                let cells = g.iter().map(|&r| col[r]);
                match name.as_str() {
                    "Open" => col[g[0]],
                    "High" => cells.fold(f64::NAN, f64::max),
                    "Low" => cells.fold(f64::NAN, f64::min),
                    "Volume" => cells.filter(|v| !v.is_nan()).sum(),
                    _ => col[g[g.len() - 1]],
                }
            })
            .collect();
        columns.push((name.clone(), values));
    }
    // Bucket labels come from a sorted index, so this cannot fail.
    Frame::from_columns(new_index, columns).unwrap_or_else(|_| frame.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_prices() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("RELIANCE.NS.csv"),
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-15,100.0,110.0,90.0,105.0,50000\n\
             2024-01-16,105.0,115.0,100.0,110.0,60000\n\
             2024-01-17,110.0,120.0,105.0,115.0,55000\n",
        )
        .unwrap();
        fs::write(
            path.join("TCS.NS.csv"),
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-16,200.0,210.0,190.0,205.0,1000\n\
             2024-01-17,205.0,215.0,200.0,,1100\n",
        )
        .unwrap();
        fs::write(path.join("EMPTY.NS.csv"), "Date,Open,High,Low,Close,Volume\n").unwrap();

        (dir, path)
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn download_builds_panel_over_date_union() {
        let (_dir, path) = setup_prices();
        let adapter = CsvPriceAdapter::new(path);
        let panel = adapter
            .download(&symbols(&["RELIANCE.NS", "TCS.NS"]), Period::Max, Interval::Day)
            .unwrap();

        assert_eq!(panel.shape(), (3, 2));
        assert_eq!(panel.symbols(), &["RELIANCE.NS", "TCS.NS"]);
        let close = panel.field("Close").unwrap();
        assert_eq!(close.get(0, 0), 105.0);
        assert!(close.get(0, 1).is_nan());
        assert_eq!(close.get(1, 1), 205.0);
        assert!(close.get(2, 1).is_nan());
    }

    #[test]
    fn missing_and_empty_files_are_reported_together() {
        let (_dir, path) = setup_prices();
        let adapter = CsvPriceAdapter::new(path);
        let err = adapter
            .download(
                &symbols(&["RELIANCE.NS", "XYZ.NS", "EMPTY.NS"]),
                Period::Max,
                Interval::Day,
            )
            .unwrap_err();
        assert_eq!(
            err,
            DataError::PricesMissing {
                symbols: symbols(&["XYZ.NS", "EMPTY.NS"])
            }
        );
        assert!(err.to_string().contains("No data found"));
    }

    #[test]
    fn period_counts_back_from_last_date() {
        let (_dir, path) = setup_prices();
        let adapter = CsvPriceAdapter::new(path);
        let panel = adapter
            .download(&symbols(&["RELIANCE.NS"]), Period::Days(1), Interval::Day)
            .unwrap();
        assert_eq!(panel.index(), &[NaiveDate::from_ymd_opt(2024, 1, 17).unwrap()]);
    }

    #[test]
    fn weekly_resample_aggregates_bars() {
        let (_dir, path) = setup_prices();
        let adapter = CsvPriceAdapter::new(path);
        let panel = adapter
            .download(&symbols(&["RELIANCE.NS"]), Period::Max, Interval::Week)
            .unwrap();
        let bar = panel.symbol("RELIANCE.NS").unwrap();
        assert_eq!(bar.shape().0, 1);
        assert_eq!(bar.index()[0], NaiveDate::from_ymd_opt(2024, 1, 17).unwrap());
        let at = |name: &str| bar.get(0, bar.column_position(name).unwrap());
        assert_eq!(at("Open"), 100.0);
        assert_eq!(at("High"), 120.0);
        assert_eq!(at("Low"), 90.0);
        assert_eq!(at("Close"), 115.0);
        assert_eq!(at("Volume"), 165000.0);
    }

    #[test]
    fn bad_number_is_malformed() {
        let (_dir, path) = setup_prices();
        fs::write(path.join("BAD.NS.csv"), "Date,Close\n2024-01-15,abc\n").unwrap();
        let adapter = CsvPriceAdapter::new(path);
        let err = adapter
            .download(&symbols(&["BAD.NS"]), Period::Max, Interval::Day)
            .unwrap_err();
        assert!(matches!(err, DataError::Malformed { symbol, .. } if symbol == "BAD.NS"));
    }

    #[test]
    fn universe_reads_symbol_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.csv");
        fs::write(
            &path,
            "Company Name,Industry,Symbol,Series\n\
             Reliance,Energy,RELIANCE,EQ\n\
             TCS,IT,tcs,EQ\n",
        )
        .unwrap();
        let symbols = CsvUniverseAdapter::new(path).load_symbols().unwrap();
        assert_eq!(symbols, vec!["RELIANCE", "tcs"]);
    }

    #[test]
    fn universe_custom_column_and_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.csv");
        fs::write(&path, "Ticker\nINFY\n").unwrap();

        let adapter = CsvUniverseAdapter::new(path.clone());
        assert_eq!(
            adapter.load_symbols().unwrap_err(),
            UniverseError::MissingColumn {
                column: "Symbol".into()
            }
        );
        let symbols = CsvUniverseAdapter::new(path)
            .with_column("Ticker")
            .load_symbols()
            .unwrap();
        assert_eq!(symbols, vec!["INFY"]);
    }

    #[test]
    fn universe_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = CsvUniverseAdapter::new(dir.path().join("nope.csv"))
            .load_symbols()
            .unwrap_err();
        assert!(matches!(err, UniverseError::Read { .. }));
    }
}
