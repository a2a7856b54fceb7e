//! Tree-walking evaluator for signal script.

use std::collections::BTreeMap;

use crate::domain::error::ScriptError;
use crate::domain::executor::Capabilities;
use crate::domain::script::args::Args;
use crate::domain::script::ast::{Expr, LogicOp, Program, Stmt, Target};
use crate::domain::script::indexing;
use crate::domain::script::methods;
use crate::domain::script::modules;
use crate::domain::script::ops;
use crate::domain::script::value::{Builtin, IndexerKind, Value};

pub struct Interpreter<'a> {
    caps: &'a Capabilities<'a>,
    env: BTreeMap<String, Value>,
}

impl<'a> Interpreter<'a> {
    pub fn new(caps: &'a Capabilities<'a>) -> Self {
        Self {
            caps,
            env: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        self.env.insert(name.to_string(), value);
    }

    pub fn into_env(self) -> BTreeMap<String, Value> {
        self.env
    }

    pub fn run(&mut self, program: &Program) -> Result<(), ScriptError> {
        for stmt in &program.statements {
            match stmt {
                Stmt::Assign { target, value, line } => {
                    let value = self.eval(value)?;
                    log::trace!("line {line}: {}", value.describe());
                    self.assign(target, value)?;
                }
                Stmt::Expr { expr, .. } => {
                    self.eval(expr)?;
                }
            }
        }
        Ok(())
    }

    /// Names resolve to script bindings first, then enabled modules, then
    /// builtins.
    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        if let Some(module) = self.caps.module(name) {
            return Ok(Value::Module(module));
        }
        Builtin::lookup(name)
            .map(Value::Builtin)
            .ok_or_else(|| ScriptError::Name(name.to_string()))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Name(name) => self.lookup(name),
            Expr::Unary { op, operand } => ops::unary(*op, &self.eval(operand)?),
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(*op, &l, &r)
            }
            Expr::Compare { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::compare(*op, &l, &r)
            }
            Expr::Logic { op, left, right } => {
                let l = self.eval(left)?;
                let short_circuit = match op {
                    LogicOp::And => !l.truth()?,
                    LogicOp::Or => l.truth()?,
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right)
                }
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.truth()?)),
            Expr::Attribute { value, attr } => match self.eval(value)? {
                Value::Module(module) => modules::module_attr(module, attr),
                other => methods::get_attr(&other, attr),
            },
            Expr::Call { func, args, kwargs } => {
                let callee = self.eval(func)?;
                let positional = self.eval_all(args)?;
                let keywords = kwargs
                    .iter()
                    .map(|(name, e)| Ok((name.clone(), self.eval(e)?)))
                    .collect::<Result<Vec<_>, ScriptError>>()?;
                self.call(&callee, &Args::new(positional, keywords))
            }
            Expr::Subscript { value, index } => {
                let target = self.eval(value)?;
                let key = self.eval_all(index)?;
                subscript(&target, &key)
            }
            Expr::Slice { start, stop } => {
                let bound = |e: &Option<Box<Expr>>| match e {
                    Some(e) => self.eval(e),
                    None => Ok(Value::None),
                };
                Ok(Value::Slice {
                    start: Box::new(bound(start)?),
                    stop: Box::new(bound(stop)?),
                })
            }
        }
    }

    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>, ScriptError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn call(&self, callee: &Value, args: &Args) -> Result<Value, ScriptError> {
        match callee {
            Value::Method { receiver, name } => match receiver.as_ref() {
                Value::Module(module) => modules::call(*module, name, args, self.caps),
                other => methods::call_method(other, name, args),
            },
            Value::Builtin(builtin) => modules::call_builtin(*builtin, args),
            other => Err(ScriptError::Type(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => {
                self.env.insert(name.clone(), value);
                Ok(())
            }
            Target::Iloc { name, index } | Target::Loc { name, index } => {
                let kind = match target {
                    Target::Iloc { .. } => IndexerKind::Iloc,
                    _ => IndexerKind::Loc,
                };
                let key = self.eval_all(index)?;
                let table = self.table_mut(name)?;
                indexing::write_indexer(table, kind, &key, &value)
            }
            Target::Item { name, key } => {
                let key = self.eval(key)?;
                let table = self.table_mut(name)?;
                indexing::write_item(table, &key, &value)
            }
        }
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut crate::domain::script::value::Table, ScriptError> {
        match self.env.get_mut(name) {
            Some(Value::Table(table)) => Ok(table),
            Some(other) => Err(ScriptError::Type(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
            None => Err(ScriptError::Name(name.to_string())),
        }
    }
}

fn subscript(target: &Value, key: &[Value]) -> Result<Value, ScriptError> {
    match target {
        Value::Indexer { table, kind } => indexing::read_indexer(table, *kind, key),
        Value::Table(table) => indexing::read_item(table, key),
        Value::Panel(panel) => indexing::read_panel(panel, key),
        Value::List(items) => pick(items, key, |v| v.clone()),
        Value::Index(dates) => pick(dates, key, |d| Value::Str(d.format("%Y-%m-%d").to_string())),
        Value::Columns(columns) => pick(columns, key, |c| Value::Str(c.clone())),
        other => Err(ScriptError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Integer position into a sequence, with negative positions from the end.
fn pick<T>(items: &[T], key: &[Value], wrap: impl Fn(&T) -> Value) -> Result<Value, ScriptError> {
    let [Value::Number(n)] = key else {
        return Err(ScriptError::Type("sequence indices must be integers".into()));
    };
    if n.fract() != 0.0 {
        return Err(ScriptError::Type("sequence indices must be integers".into()));
    }
    let len = items.len() as i64;
    let pos = if *n < 0.0 { len + *n as i64 } else { *n as i64 };
    if !(0..len).contains(&pos) {
        return Err(ScriptError::Index("index out of range".into()));
    }
    Ok(wrap(&items[pos as usize]))
}
