//! Runtime values of signal script.

use chrono::NaiveDate;
use std::rc::Rc;

use crate::domain::error::ScriptError;
use crate::domain::frame::{Frame, Panel};
use crate::domain::simulation::PortfolioResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Float,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dims {
    Frame,
    /// One column; the column label is the series name.
    Series,
}

/// A frame or series. Bool tables store `1.0`/`0.0`; NaN reads as false.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub frame: Frame<f64>,
    pub dtype: DType,
    pub dims: Dims,
}

pub fn truthy(v: f64) -> bool {
    !v.is_nan() && v != 0.0
}

pub fn from_bool(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

impl Table {
    pub fn float(frame: Frame<f64>) -> Self {
        Self {
            frame,
            dtype: DType::Float,
            dims: Dims::Frame,
        }
    }

    pub fn bools(frame: &Frame<bool>) -> Self {
        Self {
            frame: frame.map(from_bool),
            dtype: DType::Bool,
            dims: Dims::Frame,
        }
    }

    pub fn series(
        index: Vec<NaiveDate>,
        name: &str,
        values: Vec<f64>,
        dtype: DType,
    ) -> Result<Self, ScriptError> {
        let frame = Frame::from_columns(index, vec![(name.to_string(), values)])?;
        Ok(Self {
            frame,
            dtype,
            dims: Dims::Series,
        })
    }

    /// Same labels and dims, new values and dtype.
    pub fn with_frame(&self, frame: Frame<f64>, dtype: DType) -> Self {
        Self {
            frame,
            dtype,
            dims: self.dims,
        }
    }

    pub fn is_series(&self) -> bool {
        self.dims == Dims::Series
    }

    pub fn is_bool(&self) -> bool {
        self.dtype == DType::Bool
    }

    pub fn type_name(&self) -> &'static str {
        match self.dims {
            Dims::Frame => "DataFrame",
            Dims::Series => "Series",
        }
    }

    /// `(rows, cols)` for frames, `(rows,)` for series.
    pub fn shape_string(&self) -> String {
        let (rows, cols) = self.frame.shape();
        match self.dims {
            Dims::Frame => format!("({rows}, {cols})"),
            Dims::Series => format!("({rows},)"),
        }
    }

    pub fn to_bools(&self) -> Frame<bool> {
        self.frame.map(truthy)
    }

    /// Series name, or the first column label for frames.
    pub fn name(&self) -> &str {
        self.frame.columns().first().map(String::as_str).unwrap_or("")
    }

    pub fn map(&self, dtype: DType, f: impl Fn(f64) -> f64) -> Self {
        self.with_frame(self.frame.map(f), dtype)
    }

    pub fn map_columns(&self, dtype: DType, f: impl Fn(&[f64]) -> Vec<f64>) -> Self {
        self.with_frame(self.frame.map_columns(f), dtype)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerKind {
    Iloc,
    Loc,
}

impl IndexerKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexerKind::Iloc => "iloc",
            IndexerKind::Loc => "loc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Table,
    Market,
    Sim,
}

impl Module {
    pub fn name(&self) -> &'static str {
        match self {
            Module::Table => "table",
            Module::Market => "market",
            Module::Sim => "sim",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Min,
    Max,
    Len,
}

impl Builtin {
    pub const ALL: [Builtin; 4] = [Builtin::Abs, Builtin::Min, Builtin::Max, Builtin::Len];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Len => "len",
        }
    }

    pub fn lookup(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Table(Table),
    Index(Vec<NaiveDate>),
    Columns(Vec<String>),
    Panel(Rc<Panel>),
    Rolling { table: Table, window: usize },
    Ewm { table: Table, alpha: f64, adjust: bool },
    Indexer { table: Table, kind: IndexerKind },
    Module(Module),
    Builtin(Builtin),
    Method { receiver: Box<Value>, name: String },
    Portfolio(Rc<PortfolioResult>),
    Slice { start: Box<Value>, stop: Box<Value> },
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Number(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Table(t) => t.type_name(),
            Value::Index(_) => "DatetimeIndex",
            Value::Columns(_) => "Index",
            Value::Panel(_) => "DataFrame",
            Value::Rolling { .. } => "Rolling",
            Value::Ewm { .. } => "ExponentialMovingWindow",
            Value::Indexer { kind, .. } => match kind {
                IndexerKind::Iloc => "_iLocIndexer",
                IndexerKind::Loc => "_LocIndexer",
            },
            Value::Module(_) => "module",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method { .. } => "method",
            Value::Portfolio(_) => "Portfolio",
            Value::Slice { .. } => "slice",
        }
    }

    /// Scalar number, with booleans read as 1/0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(from_bool(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Python truthiness for scalars. Tables are ambiguous.
    pub fn truth(&self) -> Result<bool, ScriptError> {
        match self {
            Value::None => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::List(items) => Ok(!items.is_empty()),
            Value::Index(i) => Ok(!i.is_empty()),
            Value::Columns(c) => Ok(!c.is_empty()),
            Value::Table(t) => Err(ScriptError::Value(format!(
                "The truth value of a {} is ambiguous. Use a.any() or a.all().",
                t.type_name()
            ))),
            Value::Panel(_) => Err(ScriptError::Value(
                "The truth value of a DataFrame is ambiguous. Use a.any() or a.all().".into(),
            )),
            _ => Ok(true),
        }
    }

    /// Short description for `exec` reports and validation messages.
    pub fn describe(&self) -> String {
        match self {
            Value::Table(t) => {
                let dtype = match t.dtype {
                    DType::Float => "float",
                    DType::Bool => "bool",
                };
                format!("{} {} {}", dtype, t.type_name(), t.shape_string())
            }
            Value::Panel(p) => {
                let (rows, cols) = p.shape();
                format!("price panel ({rows}, {cols})")
            }
            Value::Number(n) => format!("float {n}"),
            Value::Bool(b) => format!("bool {}", if *b { "True" } else { "False" }),
            other => other.type_name().to_string(),
        }
    }
}
