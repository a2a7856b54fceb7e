//! Label and position selection: `[]`, `.iloc[]`, `.loc[]`, reads and writes.

use chrono::NaiveDate;

use crate::domain::error::{LabelAxis, ScriptError};
use crate::domain::frame::{Frame, Panel};
use crate::domain::script::value::{from_bool, truthy, DType, Dims, IndexerKind, Table, Value};

/// Rows or columns picked by one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A scalar key: the axis collapses.
    One(usize),
    Many(Vec<usize>),
}

impl Selector {
    fn positions(&self) -> Vec<usize> {
        match self {
            Selector::One(p) => vec![*p],
            Selector::Many(ps) => ps.clone(),
        }
    }
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

fn key_error(labels: Vec<String>, axis: LabelAxis) -> ScriptError {
    ScriptError::Key { labels, axis }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

fn wrap(pos: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if pos < 0 { pos + len } else { pos };
    (0..len).contains(&idx).then_some(idx as usize)
}

fn slice_bound(value: &Value, len: usize, default: usize) -> Result<usize, ScriptError> {
    match value {
        Value::None => Ok(default),
        other => {
            let pos = integer(other).ok_or_else(|| {
                ScriptError::Type(format!(
                    "slice indices must be integers, not {}",
                    other.type_name()
                ))
            })?;
            let len_i = len as i64;
            let idx = if pos < 0 { (pos + len_i).max(0) } else { pos.min(len_i) };
            Ok(idx as usize)
        }
    }
}

/// Positional key over an axis of length `len`.
pub fn positional(key: &Value, len: usize) -> Result<Selector, ScriptError> {
    match key {
        Value::Number(_) => {
            let pos = integer(key).ok_or_else(|| {
                ScriptError::Type("cannot index by location with a non-integer key".into())
            })?;
            wrap(pos, len)
                .map(Selector::One)
                .ok_or_else(|| ScriptError::Index("single positional indexer is out-of-bounds".into()))
        }
        Value::Slice { start, stop } => {
            let s = slice_bound(start, len, 0)?;
            let e = slice_bound(stop, len, len)?;
            Ok(Selector::Many((s..e.max(s)).collect()))
        }
        Value::List(items) if items.iter().all(|v| matches!(v, Value::Bool(_))) && !items.is_empty() => {
            if items.len() != len {
                return Err(ScriptError::Index(format!(
                    "Boolean index has wrong length: {} instead of {len}",
                    items.len()
                )));
            }
            Ok(Selector::Many(
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| matches!(v, Value::Bool(true)))
                    .map(|(i, _)| i)
                    .collect(),
            ))
        }
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let pos = integer(item).ok_or_else(|| {
                    ScriptError::Type(format!(
                        "cannot index by location with a {}",
                        item.type_name()
                    ))
                })?;
                out.push(wrap(pos, len).ok_or_else(|| {
                    ScriptError::Index("positional indexers are out-of-bounds".into())
                })?);
            }
            Ok(Selector::Many(out))
        }
        other => Err(ScriptError::Type(format!(
            "cannot index by location with a {}",
            other.type_name()
        ))),
    }
}

fn mask_labels(mask: &Table) -> Vec<String> {
    let values = mask.frame.values();
    let mut labels: Vec<String> = values
        .iter()
        .take(3)
        .map(|&v| if truthy(v) { "True".into() } else { "False".into() })
        .collect();
    if values.len() > 3 {
        labels.push("...".into());
    }
    labels
}

/// Row key by label over `index`.
pub fn row_labels(key: &Value, index: &[NaiveDate]) -> Result<Selector, ScriptError> {
    let find = |text: &str| -> Result<usize, ScriptError> {
        parse_date(text)
            .and_then(|date| index.binary_search(&date).ok())
            .ok_or_else(|| key_error(vec![text.to_string()], LabelAxis::Index))
    };
    match key {
        Value::Str(text) => find(text).map(Selector::One),
        Value::Slice { start, stop } => {
            let bound = |v: &Value| -> Result<Option<NaiveDate>, ScriptError> {
                match v {
                    Value::None => Ok(None),
                    Value::Str(text) => parse_date(text)
                        .map(Some)
                        .ok_or_else(|| key_error(vec![text.clone()], LabelAxis::Index)),
                    other => Err(ScriptError::Type(format!(
                        "cannot do slice indexing on DatetimeIndex with {}",
                        other.type_name()
                    ))),
                }
            };
            let (lo, hi) = (bound(start)?, bound(stop)?);
            Ok(Selector::Many(
                index
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| lo.is_none_or(|lo| **d >= lo) && hi.is_none_or(|hi| **d <= hi))
                    .map(|(i, _)| i)
                    .collect(),
            ))
        }
        Value::Table(mask) => {
            if mask.dims == Dims::Frame {
                return Err(ScriptError::Value("Cannot index with multidimensional key".into()));
            }
            if mask.frame.index() != index {
                return Err(key_error(mask_labels(mask), LabelAxis::Index));
            }
            Ok(Selector::Many(
                mask.frame
                    .values()
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| truthy(**v))
                    .map(|(i, _)| i)
                    .collect(),
            ))
        }
        Value::Index(dates) => {
            let missing: Vec<String> = dates
                .iter()
                .filter(|d| index.binary_search(d).is_err())
                .map(|d| d.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(key_error(missing, LabelAxis::Index));
            }
            Ok(Selector::Many(
                dates.iter().filter_map(|d| index.binary_search(d).ok()).collect(),
            ))
        }
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            let mut missing = Vec::new();
            for item in items {
                match item {
                    Value::Str(text) => match find(text) {
                        Ok(p) => out.push(p),
                        Err(_) => missing.push(text.clone()),
                    },
                    other => {
                        return Err(ScriptError::Type(format!(
                            "row labels must be date strings, not {}",
                            other.type_name()
                        )));
                    }
                }
            }
            if !missing.is_empty() {
                return Err(key_error(missing, LabelAxis::Index));
            }
            Ok(Selector::Many(out))
        }
        other => Err(ScriptError::Type(format!(
            "cannot index rows with a {}",
            other.type_name()
        ))),
    }
}

/// Column key by label over `columns`.
pub fn column_labels(key: &Value, columns: &[String]) -> Result<Selector, ScriptError> {
    let names: Vec<String> = match key {
        Value::Str(name) => {
            return columns
                .iter()
                .position(|c| c == name)
                .map(Selector::One)
                .ok_or_else(|| key_error(vec![name.clone()], LabelAxis::Columns));
        }
        Value::Slice { start, stop } if **start == Value::None && **stop == Value::None => {
            return Ok(Selector::Many((0..columns.len()).collect()));
        }
        Value::Columns(names) => names.clone(),
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ScriptError::Type(format!(
                        "column labels must be strings, not {}",
                        item.type_name()
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(ScriptError::Type(format!(
                "cannot index columns with a {}",
                other.type_name()
            )));
        }
    };
    let missing: Vec<String> = names
        .iter()
        .filter(|n| !columns.contains(n))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(key_error(missing, LabelAxis::Columns));
    }
    Ok(Selector::Many(
        names
            .iter()
            .filter_map(|n| columns.iter().position(|c| c == n))
            .collect(),
    ))
}

fn scalar(table: &Table, v: f64) -> Value {
    match table.dtype {
        DType::Bool => Value::Bool(truthy(v)),
        DType::Float => Value::Number(v),
    }
}

/// Materialize a (rows, cols) selection, collapsing scalar axes.
fn take(table: &Table, rows: &Selector, cols: &Selector) -> Result<Value, ScriptError> {
    match (rows, cols) {
        (Selector::One(r), Selector::One(c)) => Ok(scalar(table, table.frame.get(*r, *c))),
        (Selector::Many(rs), Selector::One(c)) => {
            let picked = table.frame.select_rows(rs).select_columns(&[*c]);
            Ok(Value::Table(Table {
                frame: picked,
                dtype: table.dtype,
                dims: Dims::Series,
            }))
        }
        (Selector::One(r), Selector::Many(cs)) => Ok(Value::List(
            cs.iter().map(|&c| scalar(table, table.frame.get(*r, c))).collect(),
        )),
        (Selector::Many(rs), Selector::Many(cs)) => {
            let picked = table.frame.select_rows(rs).select_columns(cs);
            Ok(Value::Table(Table {
                frame: picked,
                dtype: table.dtype,
                dims: table.dims,
            }))
        }
    }
}

fn split_key<'k>(table: &Table, key: &'k [Value]) -> Result<(&'k Value, Option<&'k Value>), ScriptError> {
    match key {
        [rows] => Ok((rows, None)),
        [rows, cols] if !table.is_series() => Ok((rows, Some(cols))),
        _ => Err(ScriptError::Index("too many indexers".into())),
    }
}

fn all_columns(table: &Table) -> Selector {
    if table.is_series() {
        Selector::One(0)
    } else {
        Selector::Many((0..table.frame.columns().len()).collect())
    }
}

/// Resolve an indexer key into row and column selectors.
pub fn resolve(table: &Table, kind: IndexerKind, key: &[Value]) -> Result<(Selector, Selector), ScriptError> {
    let (row_key, col_key) = split_key(table, key)?;
    let rows = match kind {
        IndexerKind::Iloc => positional(row_key, table.frame.index().len())?,
        IndexerKind::Loc => row_labels(row_key, table.frame.index())?,
    };
    let cols = match col_key {
        None => all_columns(table),
        Some(k) => match kind {
            IndexerKind::Iloc => positional(k, table.frame.columns().len())?,
            IndexerKind::Loc => column_labels(k, table.frame.columns())?,
        },
    };
    Ok((rows, cols))
}

pub fn read_indexer(table: &Table, kind: IndexerKind, key: &[Value]) -> Result<Value, ScriptError> {
    let (rows, cols) = resolve(table, kind, key)?;
    take(table, &rows, &cols)
}

/// `table[key]`: column labels for frames, row labels (or positions) for
/// series, and boolean row masks for both.
pub fn read_item(table: &Table, key: &[Value]) -> Result<Value, ScriptError> {
    let [key] = key else {
        return Err(ScriptError::Key {
            labels: key.iter().map(|k| k.type_name().to_string()).collect(),
            axis: LabelAxis::Columns,
        });
    };
    match (table.dims, key) {
        (_, Value::Table(_)) => {
            let rows = row_labels(key, table.frame.index())?;
            take(table, &rows, &all_columns(table))
        }
        (_, Value::Slice { .. }) => {
            let rows = positional(key, table.frame.index().len())?;
            take(table, &rows, &all_columns(table))
        }
        (Dims::Frame, _) => {
            let cols = column_labels(key, table.frame.columns())?;
            let rows = Selector::Many((0..table.frame.index().len()).collect());
            take(table, &rows, &cols)
        }
        (Dims::Series, Value::Number(_)) => {
            let rows = positional(key, table.frame.index().len())?;
            take(table, &rows, &Selector::One(0))
        }
        (Dims::Series, _) => {
            let rows = row_labels(key, table.frame.index())?;
            take(table, &rows, &Selector::One(0))
        }
    }
}

/// `raw[key]`: a symbol gives its field table, a field gives its symbol table.
pub fn read_panel(panel: &Panel, key: &[Value]) -> Result<Value, ScriptError> {
    let [Value::Str(name)] = key else {
        return Err(ScriptError::Type(
            "price panel keys must be a single symbol or field name".into(),
        ));
    };
    if let Some(frame) = panel.symbol(name) {
        return Ok(Value::Table(Table::float(frame)));
    }
    if let Some(frame) = panel.field(name) {
        return Ok(Value::Table(Table::float(frame.clone())));
    }
    Err(key_error(vec![name.clone()], LabelAxis::Columns))
}

/// A value written into a selection.
enum Fill<'v> {
    Scalar(f64, bool),
    Column(&'v Table),
}

fn fill_of(value: &Value) -> Result<Fill<'_>, ScriptError> {
    match value {
        Value::Bool(b) => Ok(Fill::Scalar(from_bool(*b), true)),
        Value::Number(n) => Ok(Fill::Scalar(*n, false)),
        Value::None => Ok(Fill::Scalar(f64::NAN, false)),
        Value::Table(t) if t.is_series() => Ok(Fill::Column(t)),
        other => Err(ScriptError::Type(format!(
            "cannot assign a {} into a table selection",
            other.type_name()
        ))),
    }
}

fn write(table: &mut Table, rows: &Selector, cols: &Selector, value: &Value) -> Result<(), ScriptError> {
    let fill = fill_of(value)?;
    let rows = rows.positions();
    let cols = cols.positions();
    match fill {
        Fill::Scalar(v, is_bool) => {
            for &r in &rows {
                for &c in &cols {
                    table.frame.set(r, c, v);
                }
            }
            if table.is_bool() && !is_bool {
                table.dtype = DType::Float;
            }
        }
        Fill::Column(series) => {
            let source: Vec<NaiveDate> = rows.iter().map(|&r| table.frame.index()[r]).collect();
            if source.iter().any(|d| series.frame.row_position(*d).is_none()) {
                return Err(ScriptError::ShapeMismatch {
                    left: format!("({},)", rows.len()),
                    right: series.shape_string(),
                });
            }
            let aligned = series.frame.reindex(&source, series.frame.columns(), f64::NAN);
            for (i, &r) in rows.iter().enumerate() {
                for &c in &cols {
                    table.frame.set(r, c, aligned.get(i, 0));
                }
            }
            if table.is_bool() && !series.is_bool() {
                table.dtype = DType::Float;
            }
        }
    }
    Ok(())
}

pub fn write_indexer(
    table: &mut Table,
    kind: IndexerKind,
    key: &[Value],
    value: &Value,
) -> Result<(), ScriptError> {
    let (rows, cols) = resolve(table, kind, key)?;
    write(table, &rows, &cols, value)
}

/// `table['COL'] = v`. Frames gain the column when it is absent.
pub fn write_item(table: &mut Table, key: &Value, value: &Value) -> Result<(), ScriptError> {
    if table.is_series() {
        let rows = row_labels(key, table.frame.index())?;
        return write(table, &rows, &Selector::One(0), value);
    }
    let Value::Str(name) = key else {
        return Err(ScriptError::Type(format!(
            "column key must be a string, not {}",
            key.type_name()
        )));
    };
    let rows = Selector::Many((0..table.frame.index().len()).collect());
    if let Some(c) = table.frame.column_position(name) {
        return write(table, &rows, &Selector::One(c), value);
    }

    let mut columns: Vec<(String, Vec<f64>)> = table
        .frame
        .columns()
        .iter()
        .enumerate()
        .map(|(c, n)| (n.clone(), table.frame.column(c)))
        .collect();
    columns.push((name.clone(), vec![f64::NAN; table.frame.index().len()]));
    let grown = Frame::from_columns(table.frame.index().to_vec(), columns)?;
    let was_bool = table.is_bool();
    table.frame = grown;
    let c = table.frame.columns().len() - 1;
    write(table, &rows, &Selector::One(c), value)?;
    if was_bool && !matches!(value, Value::Bool(_)) && !value.as_table().is_some_and(Table::is_bool) {
        table.dtype = DType::Float;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn frame() -> Table {
        Table::float(
            Frame::new(
                vec![d(1), d(2), d(3)],
                vec!["A".into(), "B".into()],
                vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            )
            .unwrap(),
        )
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn s(text: &str) -> Value {
        Value::Str(text.into())
    }

    fn full_slice() -> Value {
        Value::Slice {
            start: Box::new(Value::None),
            stop: Box::new(Value::None),
        }
    }

    #[test]
    fn column_item_returns_series() {
        let out = read_item(&frame(), &[s("B")]).unwrap();
        let t = out.as_table().unwrap();
        assert_eq!(t.dims, Dims::Series);
        assert_eq!(t.frame.values(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn missing_columns_raise_key_error() {
        let err = read_item(&frame(), &[Value::List(vec![s("A"), s("Z")])]).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: None of ['Z'] are in the [columns]");
    }

    #[test]
    fn iloc_scalar_and_negative() {
        assert_eq!(read_indexer(&frame(), IndexerKind::Iloc, &[num(1.0), num(1.0)]).unwrap(), num(4.0));
        assert_eq!(read_indexer(&frame(), IndexerKind::Iloc, &[num(-1.0), num(0.0)]).unwrap(), num(5.0));
    }

    #[test]
    fn iloc_out_of_bounds() {
        let err = read_indexer(&frame(), IndexerKind::Iloc, &[num(10.0)]).unwrap_err();
        assert!(err.to_string().starts_with("IndexError"));
    }

    #[test]
    fn iloc_slice_rows() {
        let slice = Value::Slice {
            start: Box::new(num(1.0)),
            stop: Box::new(Value::None),
        };
        let out = read_indexer(&frame(), IndexerKind::Iloc, &[slice]).unwrap();
        assert_eq!(out.as_table().unwrap().frame.shape(), (2, 2));
    }

    #[test]
    fn loc_by_date_and_column() {
        let out = read_indexer(&frame(), IndexerKind::Loc, &[s("2024-01-02"), s("A")]).unwrap();
        assert_eq!(out, num(3.0));
    }

    #[test]
    fn loc_with_misaligned_mask_is_key_error() {
        let mask = Table::series(vec![d(1), d(2)], "m", vec![1.0, 0.0], DType::Bool).unwrap();
        let err = read_indexer(&frame(), IndexerKind::Loc, &[Value::Table(mask), full_slice()]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("KeyError") && text.contains("None of"));
        assert!(text.ends_with("[index]"));
    }

    #[test]
    fn loc_assign_with_aligned_mask() {
        let mut table = Table::bools(&Frame::full_like(&frame().frame, false));
        let mask = Table::series(vec![d(1), d(2), d(3)], "m", vec![0.0, 1.0, 0.0], DType::Bool).unwrap();
        write_indexer(&mut table, IndexerKind::Loc, &[Value::Table(mask), full_slice()], &Value::Bool(true)).unwrap();
        assert_eq!(table.frame.values(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(table.is_bool());
    }

    #[test]
    fn iloc_assign_single_row() {
        let mut table = Table::bools(&Frame::full_like(&frame().frame, false));
        write_indexer(&mut table, IndexerKind::Iloc, &[num(2.0)], &Value::Bool(true)).unwrap();
        assert_eq!(table.to_bools().count_true(), 2);
    }

    #[test]
    fn item_assign_adds_column() {
        let mut table = frame();
        write_item(&mut table, &s("C"), &num(0.5)).unwrap();
        assert_eq!(table.frame.shape(), (3, 3));
        assert_eq!(table.frame.column(2), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn panel_lookup_by_symbol_or_field() {
        let close = Frame::new(vec![d(1)], vec!["X.NS".into()], vec![10.0]).unwrap();
        let panel = Panel::new(vec![("Close".into(), close)]).unwrap();
        let by_field = read_panel(&panel, &[s("Close")]).unwrap();
        assert_eq!(by_field.as_table().unwrap().frame.columns(), &["X.NS".to_string()]);
        let by_symbol = read_panel(&panel, &[s("X.NS")]).unwrap();
        assert_eq!(by_symbol.as_table().unwrap().frame.columns(), &["Close".to_string()]);
        assert!(read_panel(&panel, &[s("Y.NS")]).is_err());
    }
}
