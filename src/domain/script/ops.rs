//! Operators over script values.
//!
//! Broadcasting rules:
//! - scalar with table: the scalar applies to every cell;
//! - frame with frame, series with series: labels must be identical;
//! - frame with series: the series is a per-date column applied across every
//!   frame column, so the dates must be identical.
//!
//! Anything else is a shape mismatch. `& | ~` read their operands by
//! truthiness and always produce bool tables.

use crate::domain::error::ScriptError;
use crate::domain::frame::Frame;
use crate::domain::script::ast::{BinOp, CmpOp, UnaryOp};
use crate::domain::script::value::{from_bool, truthy, DType, Dims, Table, Value};

enum Operand<'a> {
    Scalar { value: f64, is_bool: bool },
    Table(&'a Table),
}

fn operand<'a>(value: &'a Value, op: &str, other: &Value, left: bool) -> Result<Operand<'a>, ScriptError> {
    match value {
        Value::Number(n) => Ok(Operand::Scalar {
            value: *n,
            is_bool: false,
        }),
        Value::Bool(b) => Ok(Operand::Scalar {
            value: from_bool(*b),
            is_bool: true,
        }),
        Value::Table(t) => Ok(Operand::Table(t)),
        _ => {
            let (l, r) = if left { (value, other) } else { (other, value) };
            Err(ScriptError::Type(format!(
                "unsupported operand type(s) for {op}: '{}' and '{}'",
                l.type_name(),
                r.type_name()
            )))
        }
    }
}

pub fn shape_mismatch(left: &Table, right: &Table) -> ScriptError {
    ScriptError::ShapeMismatch {
        left: left.shape_string(),
        right: right.shape_string(),
    }
}

/// Broadcast two tables onto common labels. Returns both operands as frames
/// with identical labels, plus the dims of the result.
pub fn align(left: &Table, right: &Table) -> Result<(Frame<f64>, Frame<f64>, Dims), ScriptError> {
    match (left.dims, right.dims) {
        (Dims::Frame, Dims::Frame) => {
            if left.frame.same_labels(&right.frame) {
                Ok((left.frame.clone(), right.frame.clone(), Dims::Frame))
            } else {
                Err(shape_mismatch(left, right))
            }
        }
        (Dims::Series, Dims::Series) => {
            if left.frame.index() != right.frame.index() {
                return Err(shape_mismatch(left, right));
            }
            let renamed = Frame::new(
                right.frame.index().to_vec(),
                left.frame.columns().to_vec(),
                right.frame.values().to_vec(),
            )?;
            Ok((left.frame.clone(), renamed, Dims::Series))
        }
        (Dims::Frame, Dims::Series) => {
            let spread = spread_series(right, left).ok_or_else(|| shape_mismatch(left, right))?;
            Ok((left.frame.clone(), spread, Dims::Frame))
        }
        (Dims::Series, Dims::Frame) => {
            let spread = spread_series(left, right).ok_or_else(|| shape_mismatch(left, right))?;
            Ok((spread, right.frame.clone(), Dims::Frame))
        }
    }
}

/// Repeat a series across `frame`'s columns. `None` when dates differ.
pub fn spread_series(series: &Table, frame: &Table) -> Option<Frame<f64>> {
    if series.frame.index() != frame.frame.index() {
        return None;
    }
    let column = series.frame.column(0);
    let mut spread = frame.frame.clone();
    let (rows, cols) = spread.shape();
    for r in 0..rows {
        for c in 0..cols {
            spread.set(r, c, column[r]);
        }
    }
    Some(spread)
}

fn combine(
    left: Operand<'_>,
    right: Operand<'_>,
    dtype: DType,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Table, ScriptError> {
    match (left, right) {
        (Operand::Table(l), Operand::Table(r)) => {
            let (a, b, dims) = align(l, r)?;
            Ok(Table {
                frame: a.zip_with(&b, f),
                dtype,
                dims,
            })
        }
        (Operand::Table(t), Operand::Scalar { value, .. }) => Ok(t.map(dtype, |v| f(v, value))),
        (Operand::Scalar { value, .. }, Operand::Table(t)) => Ok(t.map(dtype, |v| f(value, v))),
        (Operand::Scalar { .. }, Operand::Scalar { .. }) => {
            Err(ScriptError::Type("expected a table operand".into()))
        }
    }
}

fn python_mod(a: f64, b: f64) -> f64 {
    a - b * (a / b).floor()
}

fn arith(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => python_mod(a, b),
        BinOp::Pow => a.powf(b),
        BinOp::And => from_bool(truthy(a) && truthy(b)),
        BinOp::Or => from_bool(truthy(a) || truthy(b)),
    }
}

fn is_bool_operand(operand: &Operand<'_>) -> bool {
    match operand {
        Operand::Scalar { is_bool, .. } => *is_bool,
        Operand::Table(t) => t.is_bool(),
    }
}

pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    let l = operand(left, op.symbol(), right, true)?;
    let r = operand(right, op.symbol(), left, false)?;

    let both_bool = is_bool_operand(&l) && is_bool_operand(&r);
    let logical = matches!(op, BinOp::And | BinOp::Or);

    if let (Operand::Scalar { value: a, .. }, Operand::Scalar { value: b, .. }) = (&l, &r) {
        if logical {
            if !both_bool {
                return Err(ScriptError::Type(format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                )));
            }
            return Ok(Value::Bool(truthy(arith(op, *a, *b))));
        }
        return Ok(Value::Number(arith(op, *a, *b)));
    }

    let dtype = if logical || (op == BinOp::Mul && both_bool) {
        DType::Bool
    } else {
        DType::Float
    };
    combine(l, r, dtype, |a, b| arith(op, a, b)).map(Value::Table)
}

pub fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return match op {
            CmpOp::Eq => Ok(Value::Bool(a == b)),
            CmpOp::Ne => Ok(Value::Bool(a != b)),
            _ => Ok(Value::Bool(op.apply_ord(a.cmp(b)))),
        };
    }
    let symbol = op.symbol();
    let l = operand(left, symbol, right, true)?;
    let r = operand(right, symbol, left, false)?;
    if let (Operand::Scalar { value: a, .. }, Operand::Scalar { value: b, .. }) = (&l, &r) {
        return Ok(Value::Bool(op.apply(*a, *b)));
    }
    combine(l, r, DType::Bool, |a, b| from_bool(op.apply(a, b))).map(Value::Table)
}

pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, ScriptError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Number(-from_bool(*b))),
        (UnaryOp::Pos, Value::Number(n)) => Ok(Value::Number(*n)),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Number(from_bool(*b))),
        (UnaryOp::Neg, Value::Table(t)) => Ok(Value::Table(t.map(DType::Float, |v| -v))),
        (UnaryOp::Pos, Value::Table(t)) => Ok(Value::Table(t.clone())),
        (UnaryOp::Invert, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Invert, Value::Table(t)) => {
            Ok(Value::Table(t.map(DType::Bool, |v| from_bool(!truthy(v)))))
        }
        (op, other) => Err(ScriptError::Type(format!(
            "bad operand type for unary {}: '{}'",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Invert => "~",
            },
            other.type_name()
        ))),
    }
}
