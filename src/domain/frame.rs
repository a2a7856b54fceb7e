//! Date-indexed, symbol-columned tables.
//!
//! `Frame<f64>` is the price table (`close`), `Frame<bool>` the signal table
//! (`entries`/`exits`). A [`Panel`] is the multi-level `raw` table: one frame
//! per price field, all sharing the same index and symbol columns.
//!
//! Values are stored row-major. Index labels are strictly increasing dates and
//! column labels are unique; [`Frame::new`] enforces both.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Price fields carried by a [`Panel`], in display order.
pub const PRICE_FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("index is not strictly increasing at row {row}")]
    UnsortedIndex { row: usize },

    #[error("duplicate column label: {0}")]
    DuplicateColumn(String),

    #[error("expected {expected} values for shape ({rows}, {cols}), got {actual}")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },

    #[error("field {field} is not aligned with the other panel fields")]
    MisalignedField { field: String },

    #[error("panel has no fields")]
    EmptyPanel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    index: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<T>,
}

impl<T: Copy> Frame<T> {
    pub fn new(
        index: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<T>,
    ) -> Result<Self, FrameError> {
        if let Some(row) = index.windows(2).position(|w| w[0] >= w[1]) {
            return Err(FrameError::UnsortedIndex { row: row + 1 });
        }
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.as_str()) {
                return Err(FrameError::DuplicateColumn(col.clone()));
            }
        }
        let expected = index.len() * columns.len();
        if values.len() != expected {
            return Err(FrameError::LengthMismatch {
                rows: index.len(),
                cols: columns.len(),
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    /// Build from named columns of equal length.
    pub fn from_columns(
        index: Vec<NaiveDate>,
        columns: Vec<(String, Vec<T>)>,
    ) -> Result<Self, FrameError> {
        let rows = index.len();
        let cols = columns.len();
        let mut names = Vec::with_capacity(cols);
        let mut data = Vec::with_capacity(cols);
        for (name, col) in columns {
            if col.len() != rows {
                return Err(FrameError::LengthMismatch {
                    rows,
                    cols,
                    expected: rows,
                    actual: col.len(),
                });
            }
            names.push(name);
            data.push(col);
        }
        let mut values = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for col in &data {
                values.push(col[r]);
            }
        }
        Self::new(index, names, values)
    }

    /// A frame with the same labels as `like`, every cell set to `value`.
    pub fn full_like<U>(like: &Frame<U>, value: T) -> Self {
        Self {
            index: like.index.clone(),
            columns: like.columns.clone(),
            values: vec![value; like.index.len() * like.columns.len()],
        }
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.values[row * self.columns.len() + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let width = self.columns.len();
        self.values[row * width + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        let width = self.columns.len();
        &self.values[row * width..(row + 1) * width]
    }

    pub fn column(&self, col: usize) -> Vec<T> {
        (0..self.index.len()).map(|r| self.get(r, col)).collect()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_position(&self, date: NaiveDate) -> Option<usize> {
        self.index.binary_search(&date).ok()
    }

    /// True when both frames carry identical index and column labels.
    pub fn same_labels<U>(&self, other: &Frame<U>) -> bool {
        self.index == other.index && self.columns == other.columns
    }

    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> Frame<U> {
        Frame {
            index: self.index.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two frames with identical labels cell by cell.
    pub fn zip_with<U: Copy, V, F: Fn(T, U) -> V>(&self, other: &Frame<U>, f: F) -> Frame<V> {
        debug_assert!(self.same_labels(other));
        Frame {
            index: self.index.clone(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .zip(other.values.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Apply `f` to every column independently, keeping labels.
    pub fn map_columns<F: Fn(&[T]) -> Vec<T>>(&self, f: F) -> Frame<T> {
        let mut out = self.clone();
        for c in 0..self.columns.len() {
            let mapped = f(&self.column(c));
            for (r, v) in mapped.into_iter().enumerate() {
                out.set(r, c, v);
            }
        }
        out
    }

    pub fn select_columns(&self, positions: &[usize]) -> Frame<T> {
        let columns = positions.iter().map(|&c| self.columns[c].clone()).collect();
        let mut values = Vec::with_capacity(self.index.len() * positions.len());
        for r in 0..self.index.len() {
            for &c in positions {
                values.push(self.get(r, c));
            }
        }
        Frame {
            index: self.index.clone(),
            columns,
            values,
        }
    }

    pub fn select_rows(&self, positions: &[usize]) -> Frame<T> {
        let index = positions.iter().map(|&r| self.index[r]).collect();
        let mut values = Vec::with_capacity(positions.len() * self.columns.len());
        for &r in positions {
            values.extend_from_slice(self.row(r));
        }
        Frame {
            index,
            columns: self.columns.clone(),
            values,
        }
    }

    /// Conform this frame to the given labels. Cells whose (date, column)
    /// exists here are copied; every other cell is `fill`.
    ///
    /// `index` must itself be strictly increasing, which holds whenever it is
    /// taken from another frame.
    pub fn reindex(&self, index: &[NaiveDate], columns: &[String], fill: T) -> Frame<T> {
        let col_lookup: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let col_map: Vec<Option<usize>> = columns
            .iter()
            .map(|c| col_lookup.get(c.as_str()).copied())
            .collect();

        let mut values = Vec::with_capacity(index.len() * columns.len());
        for date in index {
            match self.row_position(*date) {
                Some(r) => {
                    for src in &col_map {
                        values.push(src.map(|c| self.get(r, c)).unwrap_or(fill));
                    }
                }
                None => values.extend(std::iter::repeat_n(fill, columns.len())),
            }
        }
        Frame {
            index: index.to_vec(),
            columns: columns.to_vec(),
            values,
        }
    }

    pub fn reindex_like<U>(&self, like: &Frame<U>, fill: T) -> Frame<T> {
        self.reindex(&like.index, &like.columns, fill)
    }
}

impl Frame<bool> {
    pub fn count_true(&self) -> usize {
        self.values.iter().filter(|&&v| v).count()
    }
}

/// Reindex a signal table onto `target`'s labels, filling new cells with
/// `false`. Tables already aligned are returned unchanged.
pub fn reconcile<U>(signals: &Frame<bool>, target: &Frame<U>) -> Frame<bool> {
    if signals.same_labels(target) {
        signals.clone()
    } else {
        signals.reindex_like(target, false)
    }
}

/// Multi-level price table: one frame per field, symbols as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    fields: Vec<(String, Frame<f64>)>,
}

impl Panel {
    /// All field frames must share index and columns.
    pub fn new(fields: Vec<(String, Frame<f64>)>) -> Result<Self, FrameError> {
        let Some((_, first)) = fields.first() else {
            return Err(FrameError::EmptyPanel);
        };
        for (name, frame) in &fields[1..] {
            if !frame.same_labels(first) {
                return Err(FrameError::MisalignedField {
                    field: name.clone(),
                });
            }
        }
        Ok(Self { fields })
    }

    /// Assemble a panel from per-symbol frames whose columns are price fields.
    ///
    /// The index is the sorted union of all symbol dates; a symbol missing a
    /// date gets NaN there. Fields absent for a symbol are NaN too.
    pub fn from_symbol_frames(symbols: Vec<(String, Frame<f64>)>) -> Result<Self, FrameError> {
        let dates: BTreeSet<NaiveDate> = symbols
            .iter()
            .flat_map(|(_, f)| f.index().iter().copied())
            .collect();
        let index: Vec<NaiveDate> = dates.into_iter().collect();

        let mut field_names: Vec<String> = Vec::new();
        for name in PRICE_FIELDS {
            if symbols
                .iter()
                .any(|(_, f)| f.column_position(name).is_some())
            {
                field_names.push(name.to_string());
            }
        }
        for (_, frame) in &symbols {
            for col in frame.columns() {
                if !field_names.contains(col) {
                    field_names.push(col.clone());
                }
            }
        }

        let aligned: Vec<Frame<f64>> = symbols
            .iter()
            .map(|(_, f)| f.reindex(&index, &field_names, f64::NAN))
            .collect();
        let symbol_names: Vec<String> = symbols.iter().map(|(s, _)| s.clone()).collect();

        let mut fields = Vec::with_capacity(field_names.len());
        for (fi, field) in field_names.iter().enumerate() {
            let columns = aligned.iter().map(|f| f.column(fi)).collect::<Vec<_>>();
            let frame = Frame::from_columns(
                index.clone(),
                symbol_names.iter().cloned().zip(columns).collect(),
            )?;
            fields.push((field.clone(), frame));
        }
        Self::new(fields)
    }

    pub fn index(&self) -> &[NaiveDate] {
        self.fields[0].1.index()
    }

    pub fn symbols(&self) -> &[String] {
        self.fields[0].1.columns()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// (rows, symbols × fields)
    pub fn shape(&self) -> (usize, usize) {
        (self.index().len(), self.symbols().len() * self.fields.len())
    }

    /// Cross-section over a field, e.g. `Close`. Matching ignores case.
    pub fn field(&self, name: &str) -> Option<&Frame<f64>> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.fields.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, f)| f)
    }

    /// Cross-section over a symbol: columns are the panel's fields.
    pub fn symbol(&self, symbol: &str) -> Option<Frame<f64>> {
        let col = self.fields[0].1.column_position(symbol)?;
        let columns = self
            .fields
            .iter()
            .map(|(name, frame)| (name.clone(), frame.column(col)))
            .collect();
        Frame::from_columns(self.index().to_vec(), columns).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn new_rejects_unsorted_index() {
        let err = Frame::new(vec![d(2), d(1)], cols(&["A"]), vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, FrameError::UnsortedIndex { row: 1 });
    }

    #[test]
    fn new_rejects_duplicate_dates() {
        let err = Frame::new(vec![d(1), d(1)], cols(&["A"]), vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, FrameError::UnsortedIndex { .. }));
    }

    #[test]
    fn new_rejects_duplicate_columns() {
        let err = Frame::new(vec![d(1)], cols(&["A", "A"]), vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, FrameError::DuplicateColumn("A".into()));
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = Frame::new(vec![d(1), d(2)], cols(&["A", "B"]), vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn from_columns_is_row_major() {
        let f = Frame::from_columns(
            vec![d(1), d(2)],
            vec![("A".into(), vec![1.0, 2.0]), ("B".into(), vec![3.0, 4.0])],
        )
        .unwrap();
        assert_eq!(f.values(), &[1.0, 3.0, 2.0, 4.0]);
        assert_eq!(f.column(1), vec![3.0, 4.0]);
        assert_eq!(f.row(1), &[2.0, 4.0]);
    }

    #[test]
    fn reindex_fills_new_cells() {
        let f = Frame::new(vec![d(1), d(3)], cols(&["A"]), vec![true, true]).unwrap();
        let out = f.reindex(&[d(1), d(2), d(3)], &cols(&["A", "B"]), false);
        assert_eq!(out.shape(), (3, 2));
        assert_eq!(out.values(), &[true, false, false, false, true, false]);
    }

    #[test]
    fn reindex_drops_unknown_labels() {
        let f = Frame::new(vec![d(1), d(2)], cols(&["A", "Z"]), vec![1.0, 9.0, 2.0, 9.0])
            .unwrap();
        let out = f.reindex(&[d(2)], &cols(&["A"]), f64::NAN);
        assert_eq!(out.values(), &[2.0]);
    }

    #[test]
    fn reconcile_returns_aligned_tables_unchanged() {
        let close = Frame::new(vec![d(1)], cols(&["A"]), vec![1.0]).unwrap();
        let entries = Frame::new(vec![d(1)], cols(&["A"]), vec![true]).unwrap();
        assert_eq!(reconcile(&entries, &close), entries);
    }

    #[test]
    fn reconcile_same_shape_different_columns() {
        let close = Frame::new(vec![d(1)], cols(&["A", "B"]), vec![1.0, 2.0]).unwrap();
        let entries = Frame::new(vec![d(1)], cols(&["B", "C"]), vec![true, true]).unwrap();
        let out = reconcile(&entries, &close);
        assert_eq!(out.columns(), close.columns());
        assert_eq!(out.values(), &[false, true]);
    }

    #[test]
    fn reconcile_widens_narrow_signals() {
        let index: Vec<NaiveDate> = (0..300)
            .map(|n| d(1) + chrono::Duration::days(n))
            .collect();
        let symbols = cols(&["A", "B", "C", "D", "E"]);
        let close = Frame::new(index.clone(), symbols.clone(), vec![1.0; 1500]).unwrap();
        let entries = Frame::new(index, cols(&["A", "B", "C"]), vec![true; 900]).unwrap();

        let out = reconcile(&entries, &close);
        assert_eq!(out.shape(), (300, 5));
        assert_eq!(out.columns(), symbols.as_slice());
        assert_eq!(out.count_true(), 900);
        assert!(out.column(3).iter().chain(out.column(4).iter()).all(|v| !v));
    }

    #[test]
    fn panel_from_symbol_frames_unions_dates() {
        let a = Frame::from_columns(
            vec![d(1), d(2)],
            vec![("Close".into(), vec![10.0, 11.0])],
        )
        .unwrap();
        let b = Frame::from_columns(
            vec![d(2), d(3)],
            vec![("Close".into(), vec![20.0, 21.0])],
        )
        .unwrap();
        let panel = Panel::from_symbol_frames(vec![("A".into(), a), ("B".into(), b)]).unwrap();

        assert_eq!(panel.index(), &[d(1), d(2), d(3)]);
        assert_eq!(panel.symbols(), &cols(&["A", "B"]));
        let close = panel.field("close").unwrap();
        assert_eq!(close.get(0, 0), 10.0);
        assert!(close.get(0, 1).is_nan());
        assert!(close.get(2, 0).is_nan());
        assert_eq!(close.get(2, 1), 21.0);
    }

    #[test]
    fn panel_shape_counts_field_columns() {
        let index = vec![d(1), d(2)];
        let symbols = cols(&["A", "B", "C"]);
        let close = Frame::new(index.clone(), symbols.clone(), vec![1.0; 6]).unwrap();
        let volume = Frame::new(index, symbols, vec![5.0; 6]).unwrap();
        let panel = Panel::new(vec![("Close".into(), close), ("Volume".into(), volume)]).unwrap();

        assert_eq!(panel.shape(), (2, 6));
        assert_eq!(panel.symbols().len(), 3);
    }

    #[test]
    fn panel_symbol_cross_section() {
        let a = Frame::from_columns(
            vec![d(1)],
            vec![("Open".into(), vec![1.0]), ("Close".into(), vec![2.0])],
        )
        .unwrap();
        let panel = Panel::from_symbol_frames(vec![("A".into(), a)]).unwrap();
        let sym = panel.symbol("A").unwrap();
        assert_eq!(sym.columns(), &cols(&["Open", "Close"]));
        assert_eq!(sym.row(0), &[1.0, 2.0]);
        assert!(panel.symbol("B").is_none());
    }

    #[test]
    fn panel_rejects_misaligned_fields() {
        let a = Frame::new(vec![d(1)], cols(&["A"]), vec![1.0]).unwrap();
        let b = Frame::new(vec![d(2)], cols(&["A"]), vec![1.0]).unwrap();
        let err = Panel::new(vec![("Open".into(), a), ("Close".into(), b)]).unwrap_err();
        assert_eq!(err, FrameError::MisalignedField { field: "Close".into() });
    }
}
