//! Call arguments and their checking.

use crate::domain::error::ScriptError;
use crate::domain::script::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    /// Reject unknown keywords and surplus positionals. `params` lists the
    /// accepted parameter names in positional order.
    pub fn check(&self, func: &str, params: &[&str]) -> Result<(), ScriptError> {
        if self.positional.len() > params.len() {
            return Err(ScriptError::Type(format!(
                "{func}() takes at most {} positional argument(s) ({} given)",
                params.len(),
                self.positional.len()
            )));
        }
        for (name, _) in &self.keywords {
            match params.iter().position(|p| p == name) {
                None => {
                    return Err(ScriptError::Type(format!(
                        "{func}() got an unexpected keyword argument '{name}'"
                    )));
                }
                Some(pos) if pos < self.positional.len() => {
                    return Err(ScriptError::Type(format!(
                        "{func}() got multiple values for argument '{name}'"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Argument by keyword, else by position.
    pub fn get(&self, pos: usize, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .or_else(|| self.positional.get(pos))
    }

    pub fn required(&self, func: &str, pos: usize, name: &str) -> Result<&Value, ScriptError> {
        self.get(pos, name).ok_or_else(|| {
            ScriptError::Type(format!(
                "{func}() missing required argument: '{name}'"
            ))
        })
    }

    pub fn number(&self, func: &str, pos: usize, name: &str) -> Result<Option<f64>, ScriptError> {
        match self.get(pos, name) {
            None | Some(Value::None) => Ok(None),
            Some(v) => v.as_number().map(Some).ok_or_else(|| {
                ScriptError::Type(format!(
                    "{func}() argument '{name}' must be a number, not {}",
                    v.type_name()
                ))
            }),
        }
    }

    pub fn integer(&self, func: &str, pos: usize, name: &str) -> Result<Option<i64>, ScriptError> {
        match self.number(func, pos, name)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 => Ok(Some(n as i64)),
            Some(n) => Err(ScriptError::Type(format!(
                "{func}() argument '{name}' must be an integer, got {n}"
            ))),
        }
    }

    pub fn flag(&self, func: &str, pos: usize, name: &str) -> Result<Option<bool>, ScriptError> {
        match self.get(pos, name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(v) => Err(ScriptError::Type(format!(
                "{func}() argument '{name}' must be True or False, not {}",
                v.type_name()
            ))),
        }
    }

    pub fn string(&self, func: &str, pos: usize, name: &str) -> Result<Option<&str>, ScriptError> {
        match self.get(pos, name) {
            None | Some(Value::None) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(v) => Err(ScriptError::Type(format!(
                "{func}() argument '{name}' must be a string, not {}",
                v.type_name()
            ))),
        }
    }
}
