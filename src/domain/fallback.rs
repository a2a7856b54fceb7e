//! Deterministic strategy used once every generated attempt has failed.
//!
//! Buys the first symbol once, at [`FALLBACK_ENTRY_ROW`], and never sells.

use crate::domain::error::FallbackError;
use crate::domain::frame::{Frame, Panel};
use crate::domain::simulation::SignalTriple;

pub const FALLBACK_ENTRY_ROW: usize = 10;

/// Signal script equivalent of [`build`], shown in logs and reports.
pub const FALLBACK_SCRIPT: &str = "close = raw.xs('Close', axis=1, level=1)
entries = table.full(False, index=close.index, columns=close.columns)
exits = table.full(False, index=close.index, columns=close.columns)
entries.iloc[10, 0] = True";

pub fn build(raw: &Panel) -> Result<SignalTriple, FallbackError> {
    let close = raw.field("Close").ok_or(FallbackError::MissingClose)?.clone();
    let (rows, cols) = close.shape();
    if cols == 0 {
        return Err(FallbackError::NoColumns);
    }
    let required = FALLBACK_ENTRY_ROW + 1;
    if rows < required {
        return Err(FallbackError::InsufficientRows { rows, required });
    }

    let mut entries = Frame::full_like(&close, false);
    entries.set(FALLBACK_ENTRY_ROW, 0, true);
    let exits = Frame::full_like(&close, false);
    Ok(SignalTriple {
        close,
        entries,
        exits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::executor::{Capabilities, SandboxedExecutor};
    use crate::domain::validator::validate;
    use chrono::{Duration, NaiveDate};

    fn panel(rows: usize, symbols: &[&str]) -> Panel {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let index = (0..rows).map(|i| start + Duration::days(i as i64)).collect();
        let columns = symbols.iter().map(|s| s.to_string()).collect();
        let close = Frame::new(index, columns, vec![100.0; rows * symbols.len()]).unwrap();
        Panel::new(vec![("Close".into(), close)]).unwrap()
    }

    #[test]
    fn one_entry_at_row_ten_first_column() {
        let triple = build(&panel(20, &["A.NS", "B.NS"])).unwrap();
        assert_eq!(triple.entries.count_true(), 1);
        assert!(triple.entries.get(FALLBACK_ENTRY_ROW, 0));
        assert_eq!(triple.exits.count_true(), 0);
        assert_eq!(triple.entries.shape(), triple.close.shape());
    }

    #[test]
    fn needs_eleven_rows() {
        assert!(build(&panel(11, &["A.NS"])).is_ok());
        assert_eq!(
            build(&panel(10, &["A.NS"])).unwrap_err(),
            FallbackError::InsufficientRows {
                rows: 10,
                required: 11
            }
        );
    }

    #[test]
    fn needs_close_field() {
        let p = panel(20, &["A.NS"]);
        let open = p.field("Close").unwrap().clone();
        let no_close = Panel::new(vec![("Open".into(), open)]).unwrap();
        assert_eq!(build(&no_close).unwrap_err(), FallbackError::MissingClose);
    }

    #[test]
    fn script_form_matches() {
        let raw = panel(15, &["A.NS", "B.NS"]);
        let caps = Capabilities::tables();
        let bindings = SandboxedExecutor::new(&caps)
            .execute(0, FALLBACK_SCRIPT, &raw)
            .unwrap();
        assert_eq!(validate(&bindings).unwrap(), build(&raw).unwrap());
    }
}
