//! Replays local scripts in place of a live model.
//!
//! Each `generate` call serves the next script in order, so a list of files
//! can walk the retry loop through known failures and a final fix.

use crate::domain::error::CodeGenError;
use crate::ports::codegen_port::CodeGenPort;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub struct ScriptReplayAdapter {
    scripts: Vec<String>,
    served: Cell<usize>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptReplayAdapter {
    pub fn new(scripts: Vec<String>) -> Self {
        Self {
            scripts,
            served: Cell::new(0),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Read every file up front so a bad path fails before the loop starts.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CodeGenError> {
        let mut scripts = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|e| CodeGenError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            scripts.push(text);
        }
        Ok(Self::new(scripts))
    }

    pub fn served(&self) -> usize {
        self.served.get()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl CodeGenPort for ScriptReplayAdapter {
    fn generate(&self, prompt: &str) -> Result<String, CodeGenError> {
        let served = self.served.get();
        let script = self
            .scripts
            .get(served)
            .ok_or(CodeGenError::ReplayExhausted { served })?;
        self.prompts.borrow_mut().push(prompt.to_string());
        self.served.set(served + 1);
        log::debug!("replaying script {} of {}", served + 1, self.scripts.len());
        Ok(script.clone())
    }
}
