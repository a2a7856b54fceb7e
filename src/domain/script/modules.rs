//! The `table`, `market`, and `sim` modules and the builtin functions.

use std::rc::Rc;

use crate::domain::error::{DataError, ScriptError};
use crate::domain::executor::Capabilities;
use crate::domain::frame::Frame;
use crate::domain::request::{Interval, Period};
use crate::domain::script::args::Args;
use crate::domain::script::methods::{column_list, date_list};
use crate::domain::script::ops::{align, shape_mismatch};
use crate::domain::script::value::{truthy, Builtin, DType, Dims, Module, Table, Value};
use crate::domain::simulation::{SignalTriple, SimulationConfig};

const TABLE_FUNCTIONS: [&str; 10] = [
    "full", "DataFrame", "Series", "where", "maximum", "minimum", "abs", "log", "sqrt", "exp",
];

fn function(module: Module, attr: &str) -> Value {
    Value::Method {
        receiver: Box::new(Value::Module(module)),
        name: attr.to_string(),
    }
}

/// `module.attr`.
pub fn module_attr(module: Module, attr: &str) -> Result<Value, ScriptError> {
    let found = match (module, attr) {
        (Module::Table, "nan") => Some(Value::Number(f64::NAN)),
        (Module::Table, f) if TABLE_FUNCTIONS.contains(&f) => Some(function(module, f)),
        (Module::Market, "download") | (Module::Sim, "from_signals") => Some(function(module, attr)),
        _ => None,
    };
    found.ok_or_else(|| ScriptError::Attribute {
        type_name: "module".into(),
        attr: attr.to_string(),
    })
}

/// `module.func(args)`.
pub fn call(module: Module, name: &str, args: &Args, caps: &Capabilities<'_>) -> Result<Value, ScriptError> {
    match module {
        Module::Table => table_function(name, args),
        Module::Market => download(args, caps),
        Module::Sim => from_signals(args, caps),
    }
}

fn table_function(name: &str, args: &Args) -> Result<Value, ScriptError> {
    match name {
        "full" | "DataFrame" | "Series" => construct(name, args),
        "where" => {
            args.check("where", &["condition", "x", "y"])?;
            let cond = args.required("where", 0, "condition")?;
            let x = args.required("where", 1, "x")?;
            let y = args.required("where", 2, "y")?;
            select(cond, x, y)
        }
        "maximum" | "minimum" => {
            args.check(name, &["x1", "x2"])?;
            let a = args.required(name, 0, "x1")?;
            let b = args.required(name, 1, "x2")?;
            let f: fn(f64, f64) -> f64 = if name == "maximum" { nan_max } else { nan_min };
            elementwise(name, a, b, f)
        }
        "abs" | "log" | "sqrt" | "exp" => {
            args.check(name, &["x"])?;
            let x = args.required(name, 0, "x")?;
            let f: fn(f64) -> f64 = match name {
                "abs" => f64::abs,
                "log" => f64::ln,
                "sqrt" => f64::sqrt,
                _ => f64::exp,
            };
            unary(name, x, f)
        }
        _ => Err(ScriptError::Attribute {
            type_name: "module".into(),
            attr: name.into(),
        }),
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }
}

fn scalar(func: &str, value: &Value) -> Result<f64, ScriptError> {
    value.as_number().ok_or_else(|| {
        ScriptError::Type(format!(
            "{func}() expects numbers or tables, not {}",
            value.type_name()
        ))
    })
}

/// `table.full(value, index=..., columns=...)`. Without columns the result
/// is a series.
fn construct(func: &str, args: &Args) -> Result<Value, ScriptError> {
    args.check(func, &["data", "index", "columns"])?;
    let data = args.get(0, "data").cloned().unwrap_or(Value::Number(f64::NAN));
    if let Value::Table(t) = &data {
        if args.get(1, "index").is_some() || args.get(2, "columns").is_some() {
            return Err(ScriptError::Type(format!(
                "{func}() takes index/columns only with scalar data; use .reindex() on a table"
            )));
        }
        return Ok(Value::Table(t.clone()));
    }
    let fill = scalar(func, &data)?;
    let dtype = if matches!(data, Value::Bool(_)) {
        DType::Bool
    } else {
        DType::Float
    };
    let index = match args.get(1, "index") {
        None | Some(Value::None) => {
            return Err(ScriptError::Value(format!("{func}() needs an index for scalar data")));
        }
        Some(v) => date_list(v)?,
    };
    let columns = match args.get(2, "columns") {
        None | Some(Value::None) => None,
        Some(_) if func == "Series" => {
            return Err(ScriptError::Type(
                "Series() got an unexpected keyword argument 'columns'".into(),
            ));
        }
        Some(v) => Some(column_list(v)?),
    };
    let table = match columns {
        None => {
            let rows = index.len();
            Table::series(index, "", vec![fill; rows], dtype)?
        }
        Some(columns) => {
            let cells = index.len() * columns.len();
            let frame = Frame::new(index, columns, vec![fill; cells])?;
            Table {
                frame,
                dtype,
                dims: Dims::Frame,
            }
        }
    };
    Ok(Value::Table(table))
}

/// Spread `value` onto `like`'s labels.
fn broadcast_to(value: &Value, like: &Table) -> Result<Frame<f64>, ScriptError> {
    match value {
        Value::Table(t) => {
            let (base, aligned, _) = align(like, t)?;
            if base.shape() != like.frame.shape() {
                return Err(shape_mismatch(like, t));
            }
            Ok(aligned)
        }
        other => Ok(Frame::full_like(&like.frame, scalar("where", other)?)),
    }
}

/// `table.where(cond, x, y)`: `x` where `cond` holds, else `y`.
fn select(cond: &Value, x: &Value, y: &Value) -> Result<Value, ScriptError> {
    let Value::Table(c) = cond else {
        let chosen = if cond.truth()? { x } else { y };
        return Ok(chosen.clone());
    };
    let xs = broadcast_to(x, c)?;
    let ys = broadcast_to(y, c)?;
    let mut out = xs;
    let (rows, cols) = out.shape();
    for r in 0..rows {
        for col in 0..cols {
            if !truthy(c.frame.get(r, col)) {
                out.set(r, col, ys.get(r, col));
            }
        }
    }
    let is_bool = |v: &Value| match v {
        Value::Bool(_) => true,
        Value::Table(t) => t.is_bool(),
        _ => false,
    };
    let dtype = if is_bool(x) && is_bool(y) {
        DType::Bool
    } else {
        DType::Float
    };
    Ok(Value::Table(c.with_frame(out, dtype)))
}

fn elementwise(func: &str, a: &Value, b: &Value, f: fn(f64, f64) -> f64) -> Result<Value, ScriptError> {
    match (a, b) {
        (Value::Table(x), Value::Table(y)) => {
            let (l, r, dims) = align(x, y)?;
            Ok(Value::Table(Table {
                frame: l.zip_with(&r, f),
                dtype: DType::Float,
                dims,
            }))
        }
        (Value::Table(x), s) => {
            let v = scalar(func, s)?;
            Ok(Value::Table(x.map(DType::Float, |c| f(c, v))))
        }
        (s, Value::Table(y)) => {
            let v = scalar(func, s)?;
            Ok(Value::Table(y.map(DType::Float, |c| f(v, c))))
        }
        (s, t) => Ok(Value::Number(f(scalar(func, s)?, scalar(func, t)?))),
    }
}

fn unary(func: &str, x: &Value, f: fn(f64) -> f64) -> Result<Value, ScriptError> {
    match x {
        Value::Table(t) => Ok(Value::Table(t.map(DType::Float, f))),
        other => Ok(Value::Number(f(scalar(func, other)?))),
    }
}

/// `market.download(tickers, period=..., interval=...)`. One symbol gives a
/// field-columned table, a list gives the full panel.
fn download(args: &Args, caps: &Capabilities<'_>) -> Result<Value, ScriptError> {
    args.check(
        "download",
        &["tickers", "period", "interval", "progress", "auto_adjust"],
    )?;
    let access = caps
        .market
        .as_ref()
        .ok_or_else(|| ScriptError::Name("market".into()))?;
    let tickers = args.required("download", 0, "tickers")?;
    let (symbols, single) = match tickers {
        Value::Str(s) => {
            let symbols: Vec<String> = s.split_whitespace().map(str::to_string).collect();
            let single = symbols.len() == 1;
            (symbols, single)
        }
        Value::List(items) => {
            let symbols = items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ScriptError::Type(format!(
                            "download() tickers must be strings, not {}",
                            item.type_name()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            (symbols, false)
        }
        Value::Columns(columns) => (columns.clone(), false),
        other => {
            return Err(ScriptError::Type(format!(
                "download() tickers must be a string or list, not {}",
                other.type_name()
            )));
        }
    };
    if symbols.is_empty() {
        return Err(ScriptError::Value("download() needs at least one ticker".into()));
    }
    let period = match args.string("download", 1, "period")? {
        Some(text) => text
            .parse::<Period>()
            .map_err(|e| ScriptError::Value(e.to_string()))?,
        None => access.period,
    };
    let interval = match args.string("download", 2, "interval")? {
        Some(text) => text
            .parse::<Interval>()
            .map_err(|e| ScriptError::Value(e.to_string()))?,
        None => access.interval,
    };

    log::debug!("script download of {} symbol(s), period {period}, interval {interval}", symbols.len());
    let panel = access.port.download(&symbols, period, interval)?;
    if single {
        let frame = panel.symbol(&symbols[0]).ok_or_else(|| {
            DataError::PricesMissing {
                symbols: symbols.clone(),
            }
        })?;
        return Ok(Value::Table(Table::float(frame)));
    }
    Ok(Value::Panel(Rc::new(panel)))
}

fn frame_arg<'v>(args: &'v Args, pos: usize, name: &str) -> Result<&'v Table, ScriptError> {
    match args.required("from_signals", pos, name)? {
        Value::Table(t) if !t.is_series() => Ok(t),
        other => Err(ScriptError::Type(format!(
            "from_signals() argument '{name}' must be a DataFrame, not {}",
            other.type_name()
        ))),
    }
}

/// `sim.from_signals(close, entries, exits, init_cash=, fees=, size=)`.
fn from_signals(args: &Args, caps: &Capabilities<'_>) -> Result<Value, ScriptError> {
    args.check(
        "from_signals",
        &["close", "entries", "exits", "init_cash", "fees", "size"],
    )?;
    let access = caps
        .sim
        .as_ref()
        .ok_or_else(|| ScriptError::Name("sim".into()))?;
    let close = frame_arg(args, 0, "close")?;
    let entries = frame_arg(args, 1, "entries")?;
    let exits = frame_arg(args, 2, "exits")?;

    let base = &access.config;
    let config = SimulationConfig {
        init_cash: args
            .number("from_signals", 3, "init_cash")?
            .unwrap_or(base.init_cash),
        fees: args.number("from_signals", 4, "fees")?.unwrap_or(base.fees),
        size: args.number("from_signals", 5, "size")?.unwrap_or(base.size),
        ..base.clone()
    };
    config.validate()?;

    let triple = SignalTriple {
        close: close.frame.clone(),
        entries: entries.to_bools(),
        exits: exits.to_bools(),
    };
    let result = access.port.from_signals(&triple, &config)?;
    Ok(Value::Portfolio(Rc::new(result)))
}

/// Call a builtin function.
pub fn call_builtin(builtin: Builtin, args: &Args) -> Result<Value, ScriptError> {
    let name = builtin.name();
    if !args.keywords.is_empty() {
        return Err(ScriptError::Type(format!(
            "{name}() takes no keyword arguments"
        )));
    }
    match builtin {
        Builtin::Abs => {
            args.check(name, &["x"])?;
            unary(name, args.required(name, 0, "x")?, f64::abs)
        }
        Builtin::Len => {
            args.check(name, &["obj"])?;
            let n = match args.required(name, 0, "obj")? {
                Value::List(items) => items.len(),
                Value::Str(s) => s.chars().count(),
                Value::Table(t) => t.frame.index().len(),
                Value::Index(dates) => dates.len(),
                Value::Columns(columns) => columns.len(),
                Value::Panel(p) => p.index().len(),
                other => {
                    return Err(ScriptError::Type(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Number(n as f64))
        }
        Builtin::Min | Builtin::Max => {
            let items: Vec<Value> = match args.positional.as_slice() {
                [Value::List(items)] => items.clone(),
                [single] => {
                    return Err(ScriptError::Type(format!(
                        "'{}' object is not iterable",
                        single.type_name()
                    )));
                }
                many => many.to_vec(),
            };
            let numbers = items
                .iter()
                .map(|v| scalar(name, v))
                .collect::<Result<Vec<_>, _>>()?;
            let pick: fn(f64, f64) -> f64 = if builtin == Builtin::Min { f64::min } else { f64::max };
            numbers
                .into_iter()
                .reduce(pick)
                .map(Value::Number)
                .ok_or_else(|| ScriptError::Value(format!("{name}() arg is an empty sequence")))
        }
    }
}
