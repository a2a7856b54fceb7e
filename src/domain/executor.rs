//! Sandboxed execution of generated signal script.
//!
//! A script sees `raw` plus the bindings its [`Capabilities`] enable and
//! nothing else. There is no filesystem, network, or process access beyond
//! the ports handed in here. Scripts have no time budget.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::domain::error::ScriptError;
use crate::domain::frame::Panel;
use crate::domain::request::{Interval, Period};
use crate::domain::script::interp::Interpreter;
use crate::domain::script::parser::parse;
use crate::domain::script::value::{Module, Value};
use crate::domain::simulation::SimulationConfig;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::simulation_port::SimulationPort;

/// Price-fetch access for `market.download`.
pub struct MarketAccess<'a> {
    pub port: &'a dyn MarketDataPort,
    pub period: Period,
    pub interval: Interval,
}

/// Simulation access for `sim.from_signals`. `config` supplies the defaults
/// a script does not override.
pub struct SimAccess<'a> {
    pub port: &'a dyn SimulationPort,
    pub config: SimulationConfig,
}

/// Allow-list of names a script may reach beyond its own assignments.
#[derive(Default)]
pub struct Capabilities<'a> {
    pub table: bool,
    pub market: Option<MarketAccess<'a>>,
    pub sim: Option<SimAccess<'a>>,
}

impl<'a> Capabilities<'a> {
    /// Table helpers only.
    pub fn tables() -> Self {
        Self {
            table: true,
            ..Self::default()
        }
    }

    pub fn with_market(mut self, port: &'a dyn MarketDataPort, period: Period, interval: Interval) -> Self {
        self.market = Some(MarketAccess {
            port,
            period,
            interval,
        });
        self
    }

    pub fn with_sim(mut self, port: &'a dyn SimulationPort, config: SimulationConfig) -> Self {
        self.sim = Some(SimAccess { port, config });
        self
    }

    /// The module bound to `name`, if enabled.
    pub fn module(&self, name: &str) -> Option<Module> {
        match name {
            "table" if self.table => Some(Module::Table),
            "market" if self.market.is_some() => Some(Module::Market),
            "sim" if self.sim.is_some() => Some(Module::Sim),
            _ => None,
        }
    }

    /// Names of the enabled modules, in binding order.
    pub fn names(&self) -> Vec<&'static str> {
        [Module::Table, Module::Market, Module::Sim]
            .into_iter()
            .map(|m| m.name())
            .filter(|name| self.module(name).is_some())
            .collect()
    }
}

/// Top-level names left behind by a script.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A script that raised, tagged with the attempt that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("attempt {attempt}: {error}")]
pub struct ExecutionFault {
    pub attempt: u32,
    pub error: ScriptError,
}

impl ExecutionFault {
    /// The text the error classifier reads.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

pub struct SandboxedExecutor<'a> {
    caps: &'a Capabilities<'a>,
}

impl<'a> SandboxedExecutor<'a> {
    pub fn new(caps: &'a Capabilities<'a>) -> Self {
        Self { caps }
    }

    /// Parse and run `code` with `raw` bound. Returns every top-level binding
    /// the script made (`raw` included).
    pub fn execute(&self, attempt: u32, code: &str, raw: &Panel) -> Result<Bindings, ExecutionFault> {
        let fault = |error: ScriptError| ExecutionFault { attempt, error };
        let program = parse(code).map_err(|e| fault(ScriptError::Syntax(e)))?;
        log::debug!(
            "attempt {attempt}: running {} statement(s) with modules [{}]",
            program.statements.len(),
            self.caps.names().join(", ")
        );

        let mut interp = Interpreter::new(self.caps);
        interp.bind("raw", Value::Panel(Rc::new(raw.clone())));
        interp.run(&program).map_err(fault)?;
        Ok(Bindings::new(interp.into_env()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::Frame;
    use chrono::NaiveDate;

    fn panel(rows: usize) -> Panel {
        let index: Vec<NaiveDate> = (0..rows)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect();
        let close: Vec<f64> = (0..rows * 2).map(|i| 100.0 + i as f64).collect();
        let frame = Frame::new(index, vec!["AAA.NS".into(), "BBB.NS".into()], close).unwrap();
        Panel::new(vec![("Close".into(), frame)]).unwrap()
    }

    #[test]
    fn binds_raw_and_returns_assignments() {
        let caps = Capabilities::tables();
        let bindings = SandboxedExecutor::new(&caps)
            .execute(1, "close = raw.xs('Close', axis=1, level=1)\nn = len(close)", &panel(5))
            .unwrap();
        assert!(bindings.contains("raw"));
        assert!(matches!(bindings.get("close"), Some(Value::Table(_))));
        assert_eq!(bindings.get("n"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn syntax_errors_become_faults() {
        let caps = Capabilities::tables();
        let fault = SandboxedExecutor::new(&caps)
            .execute(2, "for x in close:\n    pass", &panel(3))
            .unwrap_err();
        assert_eq!(fault.attempt, 2);
        assert!(fault.message().starts_with("SyntaxError"));
    }

    #[test]
    fn inverted_clip_bounds_are_value_errors() {
        let caps = Capabilities::tables();
        let fault = SandboxedExecutor::new(&caps)
            .execute(
                1,
                "close = raw.xs('Close', axis=1, level=1)\nx = close.clip(5, 1)",
                &panel(3),
            )
            .unwrap_err();
        assert!(fault.message().starts_with("ValueError: clip()"));
    }

    #[test]
    fn deep_nesting_is_a_syntax_fault() {
        let caps = Capabilities::tables();
        let code = format!("x = {}1{}", "(".repeat(500), ")".repeat(500));
        let fault = SandboxedExecutor::new(&caps)
            .execute(1, &code, &panel(3))
            .unwrap_err();
        assert!(fault.message().starts_with("SyntaxError"));
    }

    #[test]
    fn disabled_modules_are_name_errors() {
        let caps = Capabilities::default();
        let fault = SandboxedExecutor::new(&caps)
            .execute(1, "x = table.nan", &panel(3))
            .unwrap_err();
        assert_eq!(fault.message(), "NameError: name 'table' is not defined");
    }

    #[test]
    fn no_ambient_names() {
        let caps = Capabilities::tables();
        for name in ["open", "os", "exec", "__import__", "pd", "np"] {
            let fault = SandboxedExecutor::new(&caps)
                .execute(1, &format!("x = {name}"), &panel(3))
                .unwrap_err();
            assert!(fault.message().starts_with("NameError"), "{name}");
        }
    }

    #[test]
    fn capability_names_follow_enabled_modules() {
        assert_eq!(Capabilities::tables().names(), vec!["table"]);
        assert!(Capabilities::default().names().is_empty());
    }
}
