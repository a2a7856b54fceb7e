//! Attributes and methods of tables, windows, the price panel, and portfolios.

use chrono::NaiveDate;

use crate::domain::error::{LabelAxis, ScriptError};
use crate::domain::frame::{Frame, Panel};
use crate::domain::script::args::Args;
use crate::domain::script::ast::{BinOp, CmpOp};
use crate::domain::script::indexing::{self, parse_date};
use crate::domain::script::kernels;
use crate::domain::script::ops::{self, align, spread_series};
use crate::domain::script::value::{from_bool, truthy, DType, IndexerKind, Table, Value};
use crate::domain::simulation::PortfolioResult;

const TABLE_METHODS: [&str; 46] = [
    "xs", "rolling", "ewm", "shift", "diff", "pct_change", "where", "mask", "ffill", "bfill",
    "fillna", "abs", "cumsum", "cummax", "cummin", "reindex", "multiply", "mul", "add", "sub",
    "subtract", "div", "divide", "truediv", "gt", "lt", "ge", "le", "eq", "ne", "astype", "isna",
    "isnull", "notna", "notnull", "copy", "any", "all", "sum", "mean", "min", "max", "std", "clip",
    "round", "pow",
];

const ROLLING_METHODS: [&str; 6] = ["mean", "sum", "std", "min", "max", "median"];

const PORTFOLIO_METHODS: [&str; 5] = [
    "total_return",
    "final_value",
    "max_drawdown",
    "trade_count",
    "win_rate",
];

fn no_attribute(value: &Value, attr: &str) -> ScriptError {
    ScriptError::Attribute {
        type_name: value.type_name().to_string(),
        attr: attr.to_string(),
    }
}

fn method(value: &Value, attr: &str) -> Value {
    Value::Method {
        receiver: Box::new(value.clone()),
        name: attr.to_string(),
    }
}

fn shape(rows: usize, cols: Option<usize>) -> Value {
    let mut dims = vec![Value::Number(rows as f64)];
    if let Some(cols) = cols {
        dims.push(Value::Number(cols as f64));
    }
    Value::List(dims)
}

/// `value.attr` for everything except modules.
pub fn get_attr(value: &Value, attr: &str) -> Result<Value, ScriptError> {
    match value {
        Value::Table(t) => match attr {
            "index" => Ok(Value::Index(t.frame.index().to_vec())),
            "columns" if !t.is_series() => Ok(Value::Columns(t.frame.columns().to_vec())),
            "name" if t.is_series() => Ok(Value::Str(t.name().to_string())),
            "shape" => {
                let (rows, cols) = t.frame.shape();
                Ok(shape(rows, (!t.is_series()).then_some(cols)))
            }
            "iloc" => Ok(Value::Indexer {
                table: t.clone(),
                kind: IndexerKind::Iloc,
            }),
            "loc" => Ok(Value::Indexer {
                table: t.clone(),
                kind: IndexerKind::Loc,
            }),
            "empty" => Ok(Value::Bool(t.frame.is_empty())),
            m if TABLE_METHODS.contains(&m) => Ok(method(value, m)),
            _ => Err(no_attribute(value, attr)),
        },
        Value::Panel(p) => match attr {
            "index" => Ok(Value::Index(p.index().to_vec())),
            "columns" => Ok(Value::Columns(p.symbols().to_vec())),
            "shape" => {
                let (rows, cols) = p.shape();
                Ok(shape(rows, Some(cols)))
            }
            "xs" => Ok(method(value, attr)),
            _ => Err(no_attribute(value, attr)),
        },
        Value::Rolling { .. } if ROLLING_METHODS.contains(&attr) => Ok(method(value, attr)),
        Value::Ewm { .. } if attr == "mean" => Ok(method(value, attr)),
        Value::Portfolio(_) if PORTFOLIO_METHODS.contains(&attr) => Ok(method(value, attr)),
        _ => Err(no_attribute(value, attr)),
    }
}

/// Invoke a bound method. Module functions are dispatched elsewhere.
pub fn call_method(receiver: &Value, name: &str, args: &Args) -> Result<Value, ScriptError> {
    match receiver {
        Value::Table(t) => table_method(t, name, args),
        Value::Panel(p) => panel_method(p, name, args),
        Value::Rolling { table, window } => rolling_method(table, *window, name, args),
        Value::Ewm {
            table,
            alpha,
            adjust,
        } => {
            args.check("mean", &[])?;
            let (alpha, adjust) = (*alpha, *adjust);
            Ok(Value::Table(table.map_columns(DType::Float, |col| {
                if adjust {
                    kernels::ewm_mean(col, alpha)
                } else {
                    kernels::ewm_mean_recursive(col, alpha)
                }
            })))
        }
        Value::Portfolio(p) => portfolio_method(p, name, args),
        other => Err(no_attribute(other, name)),
    }
}

fn axis_of(args: &Args, func: &str, pos: usize) -> Result<Option<usize>, ScriptError> {
    match args.get(pos, "axis") {
        None | Some(Value::None) => Ok(None),
        Some(Value::Number(n)) if *n == 0.0 => Ok(Some(0)),
        Some(Value::Number(n)) if *n == 1.0 => Ok(Some(1)),
        Some(Value::Str(s)) if s == "index" || s == "rows" => Ok(Some(0)),
        Some(Value::Str(s)) if s == "columns" => Ok(Some(1)),
        Some(other) => Err(ScriptError::Value(format!(
            "{func}(): no axis named {}",
            match other {
                Value::Number(n) => n.to_string(),
                Value::Str(s) => s.clone(),
                v => v.type_name().to_string(),
            }
        ))),
    }
}

fn panel_method(panel: &Panel, name: &str, args: &Args) -> Result<Value, ScriptError> {
    if name != "xs" {
        return Err(ScriptError::Attribute {
            type_name: "DataFrame".into(),
            attr: name.into(),
        });
    }
    args.check("xs", &["key", "axis", "level", "drop_level"])?;
    let key = args
        .string("xs", 0, "key")?
        .ok_or_else(|| ScriptError::Type("xs() missing required argument: 'key'".into()))?;
    if axis_of(args, "xs", 1)? != Some(1) {
        return Err(ScriptError::Value(
            "xs() on the price panel selects columns; pass axis=1".into(),
        ));
    }
    let level = match args.get(2, "level") {
        None | Some(Value::None) => None,
        Some(Value::Number(n)) if *n == 0.0 || *n == 1.0 => Some(*n as usize),
        Some(Value::Str(s)) if s.eq_ignore_ascii_case("ticker") => Some(0),
        Some(Value::Str(s)) if s.eq_ignore_ascii_case("price") => Some(1),
        Some(other) => {
            return Err(ScriptError::Value(format!(
                "xs(): level must be 0 (symbol) or 1 (price field), got {}",
                other.describe()
            )));
        }
    };
    let by_field = || panel.field(key).map(|f| Table::float(f.clone()));
    let by_symbol = || panel.symbol(key).map(Table::float);
    let found = match level {
        Some(1) => by_field(),
        Some(_) => by_symbol(),
        None => by_field().or_else(by_symbol),
    };
    found.map(Value::Table).ok_or_else(|| ScriptError::Key {
        labels: vec![key.to_string()],
        axis: LabelAxis::Columns,
    })
}

fn rolling_method(table: &Table, window: usize, name: &str, args: &Args) -> Result<Value, ScriptError> {
    args.check(name, &[])?;
    let f: fn(&[f64]) -> f64 = match name {
        "mean" => kernels::mean,
        "sum" => kernels::sum,
        "std" => kernels::std,
        "min" => kernels::min,
        "max" => kernels::max,
        "median" => kernels::median,
        _ => {
            return Err(ScriptError::Attribute {
                type_name: "Rolling".into(),
                attr: name.into(),
            });
        }
    };
    Ok(Value::Table(table.map_columns(DType::Float, |col| {
        kernels::rolling(col, window, f)
    })))
}

fn portfolio_method(portfolio: &PortfolioResult, name: &str, args: &Args) -> Result<Value, ScriptError> {
    args.check(name, &[])?;
    let value = match name {
        "total_return" => portfolio.total_return(),
        "final_value" => portfolio.end_value,
        "max_drawdown" => portfolio.max_drawdown(),
        "trade_count" => portfolio.trade_count() as f64,
        "win_rate" => portfolio.metrics.win_rate,
        _ => {
            return Err(ScriptError::Attribute {
                type_name: "Portfolio".into(),
                attr: name.into(),
            });
        }
    };
    Ok(Value::Number(value))
}

fn periods(args: &Args, func: &str) -> Result<i64, ScriptError> {
    args.check(func, &["periods"])?;
    Ok(args.integer(func, 0, "periods")?.unwrap_or(1))
}

fn table_method(t: &Table, name: &str, args: &Args) -> Result<Value, ScriptError> {
    let table = |out: Table| -> Result<Value, ScriptError> { Ok(Value::Table(out)) };
    match name {
        "xs" => {
            args.check("xs", &["key", "axis", "level", "drop_level"])?;
            let key = args.required("xs", 0, "key")?;
            match axis_of(args, "xs", 1)? {
                Some(1) => indexing::read_item(t, std::slice::from_ref(key)),
                _ => indexing::read_indexer(t, IndexerKind::Loc, std::slice::from_ref(key)),
            }
        }
        "rolling" => {
            args.check("rolling", &["window"])?;
            let window = args
                .integer("rolling", 0, "window")?
                .ok_or_else(|| ScriptError::Type("rolling() missing required argument: 'window'".into()))?;
            if window < 1 {
                return Err(ScriptError::Value("window must be an integer 1 or greater".into()));
            }
            Ok(Value::Rolling {
                table: t.clone(),
                window: window as usize,
            })
        }
        "ewm" => {
            args.check("ewm", &["com", "span", "halflife", "alpha", "adjust"])?;
            let com = args.number("ewm", 0, "com")?;
            let span = args.number("ewm", 1, "span")?;
            let alpha = args.number("ewm", 3, "alpha")?;
            if args.get(2, "halflife").is_some() {
                return Err(ScriptError::Value("ewm(): halflife is not supported, use span".into()));
            }
            let alpha = match (com, span, alpha) {
                (Some(c), None, None) if c >= 0.0 => 1.0 / (1.0 + c),
                (None, Some(s), None) if s >= 1.0 => kernels::span_alpha(s),
                (None, None, Some(a)) if a > 0.0 && a <= 1.0 => a,
                (None, None, None) => {
                    return Err(ScriptError::Value(
                        "Must pass one of comass, span, halflife, or alpha".into(),
                    ));
                }
                _ => {
                    return Err(ScriptError::Value(
                        "ewm(): pass exactly one valid decay parameter (com >= 0, span >= 1, 0 < alpha <= 1)".into(),
                    ));
                }
            };
            let adjust = args.flag("ewm", 4, "adjust")?.unwrap_or(true);
            Ok(Value::Ewm {
                table: t.clone(),
                alpha,
                adjust,
            })
        }
        "shift" => {
            let n = periods(args, "shift")?;
            table(t.map_columns(t.dtype, |col| kernels::shift(col, n)))
        }
        "diff" => {
            let n = periods(args, "diff")?;
            table(t.map_columns(DType::Float, |col| kernels::diff(col, n)))
        }
        "pct_change" => {
            let n = periods(args, "pct_change")?;
            table(t.map_columns(DType::Float, |col| kernels::pct_change(col, n)))
        }
        "where" | "mask" => {
            args.check(name, &["cond", "other"])?;
            let cond = args.required(name, 0, "cond")?;
            let other = args.get(1, "other").cloned().unwrap_or(Value::Number(f64::NAN));
            where_(t, cond, &other, name == "mask")
        }
        "ffill" => {
            args.check("ffill", &[])?;
            table(t.map_columns(t.dtype, kernels::ffill))
        }
        "bfill" => {
            args.check("bfill", &[])?;
            table(t.map_columns(t.dtype, kernels::bfill))
        }
        "fillna" => {
            args.check("fillna", &["value"])?;
            let value = args.required("fillna", 0, "value")?;
            let fill = value.as_number().ok_or_else(|| {
                ScriptError::Type(format!(
                    "fillna() value must be a scalar, not {}",
                    value.type_name()
                ))
            })?;
            let dtype = if t.is_bool() && matches!(value, Value::Bool(_)) {
                DType::Bool
            } else {
                DType::Float
            };
            table(t.map(dtype, |v| if v.is_nan() { fill } else { v }))
        }
        "abs" => {
            args.check("abs", &[])?;
            table(t.map(DType::Float, f64::abs))
        }
        "cumsum" => {
            args.check("cumsum", &[])?;
            table(t.map_columns(DType::Float, kernels::cumsum))
        }
        "cummax" => {
            args.check("cummax", &[])?;
            table(t.map_columns(DType::Float, kernels::cummax))
        }
        "cummin" => {
            args.check("cummin", &[])?;
            table(t.map_columns(DType::Float, kernels::cummin))
        }
        "reindex" => reindex(t, args),
        "multiply" | "mul" | "add" | "sub" | "subtract" | "div" | "divide" | "truediv" | "pow" => {
            args.check(name, &["other", "axis"])?;
            let other = args.required(name, 0, "other")?;
            let axis = axis_of(args, name, 1)?;
            if axis == Some(1) && !t.is_series() && other.as_table().is_some_and(Table::is_series) {
                return Err(ScriptError::Value(format!(
                    "{name}() with a date-indexed Series broadcasts along the index; pass axis=0"
                )));
            }
            let op = match name {
                "multiply" | "mul" => BinOp::Mul,
                "add" => BinOp::Add,
                "sub" | "subtract" => BinOp::Sub,
                "pow" => BinOp::Pow,
                _ => BinOp::Div,
            };
            ops::binary(op, &Value::Table(t.clone()), other)
        }
        "gt" | "lt" | "ge" | "le" | "eq" | "ne" => {
            args.check(name, &["other"])?;
            let other = args.required(name, 0, "other")?;
            let op = match name {
                "gt" => CmpOp::Gt,
                "lt" => CmpOp::Lt,
                "ge" => CmpOp::Ge,
                "le" => CmpOp::Le,
                "eq" => CmpOp::Eq,
                _ => CmpOp::Ne,
            };
            ops::compare(op, &Value::Table(t.clone()), other)
        }
        "astype" => {
            args.check("astype", &["dtype"])?;
            let dtype = args
                .string("astype", 0, "dtype")?
                .ok_or_else(|| ScriptError::Type("astype() expects a dtype name such as 'bool'".into()))?;
            match dtype {
                "bool" | "boolean" => table(t.map(DType::Bool, |v| from_bool(truthy(v)))),
                "float" | "float64" | "float32" => table(t.with_frame(t.frame.clone(), DType::Float)),
                "int" | "int64" | "int32" => {
                    if t.frame.values().iter().any(|v| !v.is_finite()) {
                        return Err(ScriptError::Value(
                            "Cannot convert non-finite values (NA or inf) to integer".into(),
                        ));
                    }
                    table(t.map(DType::Float, f64::trunc))
                }
                other => Err(ScriptError::Type(format!("data type '{other}' not understood"))),
            }
        }
        "isna" | "isnull" => {
            args.check(name, &[])?;
            table(t.map(DType::Bool, |v| from_bool(v.is_nan())))
        }
        "notna" | "notnull" => {
            args.check(name, &[])?;
            table(t.map(DType::Bool, |v| from_bool(!v.is_nan())))
        }
        "copy" => {
            args.check("copy", &["deep"])?;
            table(t.clone())
        }
        "any" | "all" | "sum" | "mean" | "min" | "max" | "std" => reduce(t, name, args),
        "clip" => {
            args.check("clip", &["lower", "upper"])?;
            let lower = args.number("clip", 0, "lower")?.unwrap_or(f64::NEG_INFINITY);
            let upper = args.number("clip", 1, "upper")?.unwrap_or(f64::INFINITY);
            if lower.is_nan() || upper.is_nan() || lower > upper {
                return Err(ScriptError::Value(
                    "clip(): lower must be <= upper and neither may be NaN".into(),
                ));
            }
            table(t.map(DType::Float, |v| if v.is_nan() { v } else { v.clamp(lower, upper) }))
        }
        "round" => {
            args.check("round", &["decimals"])?;
            let decimals = args.integer("round", 0, "decimals")?.unwrap_or(0);
            let scale = 10f64.powi(decimals as i32);
            table(t.map(DType::Float, |v| (v * scale).round() / scale))
        }
        _ => Err(ScriptError::Attribute {
            type_name: t.type_name().into(),
            attr: name.into(),
        }),
    }
}

/// Keep cells where `cond` holds (or fails, for `mask`), else `other`.
fn where_(t: &Table, cond: &Value, other: &Value, invert: bool) -> Result<Value, ScriptError> {
    let keep: Frame<bool> = match cond {
        Value::Table(c) => {
            let (base, aligned, _) = align(t, c)?;
            if base.shape() != t.frame.shape() {
                return Err(ops::shape_mismatch(t, c));
            }
            aligned.map(truthy)
        }
        Value::Bool(b) => Frame::full_like(&t.frame, *b),
        other => {
            return Err(ScriptError::Type(format!(
                "where() condition must be a boolean table, not {}",
                other.type_name()
            )));
        }
    };
    let keep = if invert { keep.map(|k| !k) } else { keep };

    let replacement: Frame<f64> = match other {
        Value::Table(o) => {
            if o.is_series() && !t.is_series() {
                spread_series(o, t).ok_or_else(|| ops::shape_mismatch(t, o))?
            } else if o.frame.same_labels(&t.frame) {
                o.frame.clone()
            } else {
                return Err(ops::shape_mismatch(t, o));
            }
        }
        scalar => {
            let v = scalar.as_number().ok_or_else(|| {
                ScriptError::Type(format!(
                    "where() other must be a scalar or table, not {}",
                    scalar.type_name()
                ))
            })?;
            Frame::full_like(&t.frame, v)
        }
    };

    let mut values = t.frame.clone();
    let (rows, cols) = values.shape();
    for r in 0..rows {
        for c in 0..cols {
            if !keep.get(r, c) {
                values.set(r, c, replacement.get(r, c));
            }
        }
    }
    let other_is_bool = match other {
        Value::Bool(_) => true,
        Value::Table(o) => o.is_bool(),
        _ => false,
    };
    let dtype = if t.is_bool() && other_is_bool {
        DType::Bool
    } else {
        DType::Float
    };
    Ok(Value::Table(t.with_frame(values, dtype)))
}

pub fn date_list(value: &Value) -> Result<Vec<NaiveDate>, ScriptError> {
    let dates = match value {
        Value::Index(dates) => dates.clone(),
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str().and_then(parse_date).ok_or_else(|| {
                    ScriptError::Type(format!(
                        "index labels must be dates like '2024-01-31', got {}",
                        item.describe()
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(ScriptError::Type(format!(
                "index must be an index or list of dates, not {}",
                other.type_name()
            )));
        }
    };
    if dates.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ScriptError::Value("index must be monotonic increasing and unique".into()));
    }
    Ok(dates)
}

pub fn column_list(value: &Value) -> Result<Vec<String>, ScriptError> {
    let columns: Vec<String> = match value {
        Value::Columns(columns) => columns.clone(),
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
                "columns must be column labels, not {}",
                other.type_name()
            )));
        }
    };
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(ScriptError::Value(format!("duplicate column label '{dup}'")));
    }
    Ok(columns)
}

fn reindex(t: &Table, args: &Args) -> Result<Value, ScriptError> {
    args.check("reindex", &["index", "columns", "fill_value"])?;
    let index = match args.get(0, "index") {
        None | Some(Value::None) => t.frame.index().to_vec(),
        Some(v) => date_list(v)?,
    };
    let columns = match args.get(1, "columns") {
        None | Some(Value::None) => t.frame.columns().to_vec(),
        Some(_) if t.is_series() => {
            return Err(ScriptError::Type(
                "reindex() got an unexpected keyword argument 'columns'".into(),
            ));
        }
        Some(v) => column_list(v)?,
    };
    let fill = args.get(2, "fill_value");
    let fill_value = match fill {
        None | Some(Value::None) => f64::NAN,
        Some(v) => v.as_number().ok_or_else(|| {
            ScriptError::Type(format!(
                "fill_value must be a scalar, not {}",
                v.type_name()
            ))
        })?,
    };
    let unchanged = t.frame.index() == index.as_slice() && t.frame.columns() == columns.as_slice();
    let dtype = if t.is_bool() && (unchanged || matches!(fill, Some(Value::Bool(_)))) {
        DType::Bool
    } else {
        DType::Float
    };
    Ok(Value::Table(t.with_frame(t.frame.reindex(&index, &columns, fill_value), dtype)))
}

fn reduce_values(name: &str, values: &[f64]) -> f64 {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    match name {
        "any" => from_bool(present.iter().any(|&v| truthy(v))),
        "all" => from_bool(present.iter().all(|&v| truthy(v))),
        "sum" => present.iter().sum(),
        "mean" if present.is_empty() => f64::NAN,
        "mean" => kernels::mean(&present),
        "std" => kernels::std(&present),
        "min" if present.is_empty() => f64::NAN,
        "min" => kernels::min(&present),
        "max" if present.is_empty() => f64::NAN,
        _ => kernels::max(&present),
    }
}

fn reduce(t: &Table, name: &str, args: &Args) -> Result<Value, ScriptError> {
    args.check(name, &["axis"])?;
    let axis = axis_of(args, name, 0)?;
    let dtype = if name == "any" || name == "all" {
        DType::Bool
    } else {
        DType::Float
    };
    if t.is_series() {
        let v = reduce_values(name, t.frame.values());
        return Ok(match dtype {
            DType::Bool => Value::Bool(truthy(v)),
            DType::Float => Value::Number(v),
        });
    }
    if axis != Some(1) {
        return Err(ScriptError::Value(format!(
            "{name}() on a DataFrame reduces across symbols only; pass axis=1"
        )));
    }
    let rows = t.frame.index().len();
    let values = (0..rows).map(|r| reduce_values(name, t.frame.row(r))).collect();
    Ok(Value::Table(Table::series(t.frame.index().to_vec(), "", values, dtype)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn close() -> Table {
        Table::float(
            Frame::from_columns(
                vec![d(1), d(2), d(3), d(4)],
                vec![
                    ("A".into(), vec![1.0, 2.0, 3.0, 4.0]),
                    ("B".into(), vec![4.0, 3.0, 2.0, 1.0]),
                ],
            )
            .unwrap(),
        )
    }

    fn call(t: &Table, name: &str, positional: Vec<Value>, keywords: Vec<(&str, Value)>) -> Result<Value, ScriptError> {
        let args = Args::new(
            positional,
            keywords.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        );
        call_method(&Value::Table(t.clone()), name, &args)
    }

    fn table(v: Value) -> Table {
        match v {
            Value::Table(t) => t,
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn rolling_mean_through_window_value() {
        let window = call(&close(), "rolling", vec![Value::Number(2.0)], vec![]).unwrap();
        let out = table(call_method(&window, "mean", &Args::default()).unwrap());
        assert!(out.frame.get(0, 0).is_nan());
        assert_eq!(out.frame.get(1, 0), 1.5);
        assert_eq!(out.frame.get(3, 1), 1.5);
    }

    #[test]
    fn ewm_requires_a_decay_parameter() {
        let err = call(&close(), "ewm", vec![], vec![]).unwrap_err();
        assert!(err.to_string().contains("Must pass one of"));
        let ewm = call(&close(), "ewm", vec![], vec![("span", Value::Number(3.0))]).unwrap();
        let out = table(call_method(&ewm, "mean", &Args::default()).unwrap());
        assert_eq!(out.frame.get(0, 0), 1.0);
    }

    #[test]
    fn shift_keeps_bool_dtype() {
        let flags = Table::bools(&close().frame.map(|v| v > 2.0));
        let out = table(call(&flags, "shift", vec![Value::Number(1.0)], vec![]).unwrap());
        assert!(out.is_bool());
        assert!(out.frame.get(0, 0).is_nan());
    }

    #[test]
    fn where_replaces_failing_cells() {
        let c = close();
        let cond = ops::compare(CmpOp::Gt, &Value::Table(c.clone()), &Value::Number(2.0)).unwrap();
        let out = table(call(&c, "where", vec![cond, Value::Number(0.0)], vec![]).unwrap());
        assert_eq!(out.frame.column(0), vec![0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn mask_is_inverse_of_where() {
        let c = close();
        let cond = ops::compare(CmpOp::Gt, &Value::Table(c.clone()), &Value::Number(2.0)).unwrap();
        let out = table(call(&c, "mask", vec![cond], vec![]).unwrap());
        assert_eq!(out.frame.get(0, 0), 1.0);
        assert!(out.frame.get(3, 0).is_nan());
    }

    #[test]
    fn reindex_onto_wider_columns_fills() {
        let narrow = Table::bools(&close().frame.select_columns(&[0]).map(|_| true));
        let cols = Value::Columns(vec!["A".into(), "B".into()]);
        let out = table(
            call(
                &narrow,
                "reindex",
                vec![],
                vec![("columns", cols), ("fill_value", Value::Bool(false))],
            )
            .unwrap(),
        );
        assert!(out.is_bool());
        assert_eq!(out.frame.shape(), (4, 2));
        assert_eq!(out.to_bools().count_true(), 4);
    }

    #[test]
    fn multiply_with_axis_zero_applies_mask_per_date() {
        let c = close();
        let mask = Table::series(vec![d(1), d(2), d(3), d(4)], "m", vec![1.0, 0.0, 1.0, 0.0], DType::Bool).unwrap();
        let out = table(
            call(&c, "multiply", vec![Value::Table(mask.clone())], vec![("axis", Value::Number(0.0))]).unwrap(),
        );
        assert_eq!(out.frame.column(1), vec![4.0, 0.0, 2.0, 0.0]);

        let err = call(&c, "multiply", vec![Value::Table(mask)], vec![("axis", Value::Str("columns".into()))]).unwrap_err();
        assert!(err.to_string().contains("axis=0"));
    }

    #[test]
    fn any_needs_axis_one_on_frames() {
        let flags = Table::bools(&close().frame.map(|v| v > 3.0));
        let err = call(&flags, "any", vec![], vec![]).unwrap_err();
        assert!(err.to_string().contains("axis=1"));
        let out = table(call(&flags, "any", vec![], vec![("axis", Value::Number(1.0))]).unwrap());
        assert!(out.is_series());
        assert_eq!(out.frame.values(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn clip_bounds_values() {
        let out = table(call(&close(), "clip", vec![Value::Number(2.0), Value::Number(3.0)], vec![]).unwrap());
        assert_eq!(out.frame.column(0), vec![2.0, 2.0, 3.0, 3.0]);
        let out = table(call(&close(), "clip", vec![], vec![("upper", Value::Number(2.5))]).unwrap());
        assert_eq!(out.frame.column(1), vec![2.5, 2.5, 2.0, 1.0]);
    }

    #[test]
    fn clip_rejects_inverted_or_nan_bounds() {
        let err = call(&close(), "clip", vec![Value::Number(5.0), Value::Number(1.0)], vec![]).unwrap_err();
        assert!(err.to_string().starts_with("ValueError: clip()"));
        let err = call(&close(), "clip", vec![Value::Number(f64::NAN), Value::Number(1.0)], vec![]).unwrap_err();
        assert!(matches!(err, ScriptError::Value(_)));
    }

    #[test]
    fn series_reductions_are_scalars() {
        let series = table(indexing::read_item(&close(), &[Value::Str("A".into())]).unwrap());
        let out = call(&series, "mean", vec![], vec![]).unwrap();
        assert_eq!(out, Value::Number(2.5));
    }

    #[test]
    fn astype_bool_treats_nan_as_false() {
        let t = Table::float(Frame::new(vec![d(1), d(2)], vec!["A".into()], vec![f64::NAN, 2.0]).unwrap());
        let out = table(call(&t, "astype", vec![Value::Str("bool".into())], vec![]).unwrap());
        assert_eq!(out.frame.values(), &[0.0, 1.0]);
    }

    #[test]
    fn unknown_method_is_attribute_error() {
        let err = get_attr(&Value::Table(close()), "apply").unwrap_err();
        assert_eq!(
            err.to_string(),
            "AttributeError: 'DataFrame' object has no attribute 'apply'"
        );
    }

    #[test]
    fn panel_xs_by_level() {
        let close_frame = Frame::new(vec![d(1)], vec!["X.NS".into()], vec![10.0]).unwrap();
        let open_frame = Frame::new(vec![d(1)], vec!["X.NS".into()], vec![9.0]).unwrap();
        let panel = Panel::new(vec![("Open".into(), open_frame), ("Close".into(), close_frame)]).unwrap();
        let args = Args::new(
            vec![Value::Str("Close".into())],
            vec![
                ("axis".into(), Value::Number(1.0)),
                ("level".into(), Value::Number(1.0)),
            ],
        );
        let out = table(panel_method(&panel, "xs", &args).unwrap());
        assert_eq!(out.frame.values(), &[10.0]);

        let args = Args::new(
            vec![Value::Str("Close".into())],
            vec![
                ("axis".into(), Value::Number(1.0)),
                ("level".into(), Value::Number(0.0)),
            ],
        );
        let err = panel_method(&panel, "xs", &args).unwrap_err();
        assert!(err.to_string().starts_with("KeyError"));
    }
}
