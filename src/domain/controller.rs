//! The generate, execute, validate, repair loop.
//!
//! [`RetryController::run`] drives an explicit state machine:
//!
//! ```text
//! Generating -> Executing -> Validating -> Succeeded
//!                   |             |
//!                   +-> Retrying <+   (attempt < max)
//!                   +-> Exhausted <+  (attempt == max) -> fallback
//! ```
//!
//! Each failure is classified and fed into the next prompt. Code generation
//! failures end the run immediately.

use crate::domain::classifier::{ClassifiedError, ErrorClassifier};
use crate::domain::error::AppError;
use crate::domain::executor::{Bindings, Capabilities, SandboxedExecutor};
use crate::domain::fallback::{self, FALLBACK_SCRIPT};
use crate::domain::frame::Panel;
use crate::domain::prompt::{PromptBuilder, RetryFeedback};
use crate::domain::sanitizer::sanitize;
use crate::domain::simulation::{PortfolioResult, SimulationConfig};
use crate::domain::validator::validate;
use crate::ports::codegen_port::CodeGenPort;
use crate::ports::simulation_port::SimulationPort;

/// Where the loop is. Each state carries what the next step needs.
#[derive(Debug)]
pub enum LoopState {
    Generating,
    Executing { code: String },
    Validating { code: String, bindings: Bindings },
    Succeeded { code: String, portfolio: PortfolioResult },
    Retrying,
    Exhausted,
}

impl LoopState {
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::Generating => "Generating",
            LoopState::Executing { .. } => "Executing",
            LoopState::Validating { .. } => "Validating",
            LoopState::Succeeded { .. } => "Succeeded",
            LoopState::Retrying => "Retrying",
            LoopState::Exhausted => "Exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(ClassifiedError),
}

/// One generated program and what became of it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub code: String,
    pub outcome: AttemptOutcome,
}

/// State carried across attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptContext {
    /// 1-based number of the attempt in progress.
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_code: Option<String>,
    pub last_error: Option<ClassifiedError>,
    pub history: Vec<AttemptRecord>,
}

impl AttemptContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
            last_code: None,
            last_error: None,
            history: Vec::new(),
        }
    }

    /// Feedback about the previous attempt, if there was one.
    pub fn feedback(&self) -> Option<RetryFeedback> {
        match (&self.last_code, &self.last_error) {
            (Some(code), Some(error)) => Some(RetryFeedback {
                attempt: self.attempt - 1,
                previous_code: code.clone(),
                error: error.clone(),
            }),
            _ => None,
        }
    }

    /// Record a failed attempt and pick the next state.
    pub fn fail(&mut self, code: String, error: ClassifiedError) -> LoopState {
        log::warn!(
            "attempt {}/{} failed ({}): {}",
            self.attempt,
            self.max_attempts,
            error.category,
            error.message
        );
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            code: code.clone(),
            outcome: AttemptOutcome::Failed(error.clone()),
        });
        self.last_code = Some(code);
        self.last_error = Some(error);
        if self.attempt < self.max_attempts {
            LoopState::Retrying
        } else {
            LoopState::Exhausted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Generated { attempt: u32 },
    Fallback,
}

/// The portfolio and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestOutcome {
    pub portfolio: PortfolioResult,
    pub source: OutcomeSource,
    pub attempts: Vec<AttemptRecord>,
    /// The script whose signals were simulated.
    pub code: String,
}

pub struct RetryController<'a> {
    codegen: &'a dyn CodeGenPort,
    simulator: &'a dyn SimulationPort,
    caps: &'a Capabilities<'a>,
    prompts: PromptBuilder,
    classifier: ErrorClassifier,
}

impl<'a> RetryController<'a> {
    pub fn new(
        codegen: &'a dyn CodeGenPort,
        simulator: &'a dyn SimulationPort,
        caps: &'a Capabilities<'a>,
    ) -> Self {
        Self {
            codegen,
            simulator,
            caps,
            prompts: PromptBuilder::default(),
            classifier: ErrorClassifier::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn run(
        &self,
        strategy: &str,
        raw: &Panel,
        config: &SimulationConfig,
        max_attempts: u32,
    ) -> Result<BacktestOutcome, AppError> {
        let executor = SandboxedExecutor::new(self.caps);
        let mut ctx = AttemptContext::new(max_attempts);
        let mut state = LoopState::Generating;

        loop {
            log::debug!("attempt {}: {}", ctx.attempt, state.name());
            state = match state {
                LoopState::Generating => {
                    let prompt = self.prompts.build(strategy, ctx.feedback().as_ref());
                    let completion = self.codegen.generate(&prompt)?;
                    let code = sanitize(&completion);
                    log::debug!("attempt {} generated code:\n{code}", ctx.attempt);
                    LoopState::Executing { code }
                }
                LoopState::Executing { code } => match executor.execute(ctx.attempt, &code, raw) {
                    Ok(bindings) => LoopState::Validating { code, bindings },
                    Err(fault) => {
                        let error = self.classifier.classify(&fault.message());
                        ctx.fail(code, error)
                    }
                },
                LoopState::Validating { code, bindings } => {
                    let result = validate(&bindings)
                        .map_err(|e| e.to_string())
                        .and_then(|triple| {
                            self.simulator
                                .from_signals(&triple, config)
                                .map_err(|e| e.to_string())
                        });
                    match result {
                        Ok(portfolio) => LoopState::Succeeded { code, portfolio },
                        Err(message) => {
                            let error = self.classifier.classify(&message);
                            ctx.fail(code, error)
                        }
                    }
                }
                LoopState::Succeeded { code, portfolio } => {
                    log::info!("attempt {} succeeded", ctx.attempt);
                    ctx.history.push(AttemptRecord {
                        attempt: ctx.attempt,
                        code: code.clone(),
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return Ok(BacktestOutcome {
                        portfolio,
                        source: OutcomeSource::Generated {
                            attempt: ctx.attempt,
                        },
                        attempts: ctx.history,
                        code,
                    });
                }
                LoopState::Retrying => {
                    ctx.attempt += 1;
                    LoopState::Generating
                }
                LoopState::Exhausted => return self.fall_back(raw, config, ctx),
            };
        }
    }

    fn fall_back(
        &self,
        raw: &Panel,
        config: &SimulationConfig,
        ctx: AttemptContext,
    ) -> Result<BacktestOutcome, AppError> {
        log::warn!(
            "all {} generated attempts failed, using fallback strategy",
            ctx.max_attempts
        );
        let result = fallback::build(raw)
            .map_err(|e| e.to_string())
            .and_then(|triple| {
                self.simulator
                    .from_signals(&triple, config)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(portfolio) => {
                log::info!("fallback strategy executed successfully");
                Ok(BacktestOutcome {
                    portfolio,
                    source: OutcomeSource::Fallback,
                    attempts: ctx.history,
                    code: FALLBACK_SCRIPT.to_string(),
                })
            }
            Err(reason) => {
                log::error!("fallback strategy also failed: {reason}");
                Err(AppError::ExhaustedRetries {
                    attempts: ctx.max_attempts,
                    last_error: ctx
                        .last_error
                        .map(|e| e.feedback())
                        .unwrap_or_default(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::ErrorCategory;

    fn classified(message: &str) -> ClassifiedError {
        ErrorClassifier::default().classify(message)
    }

    #[test]
    fn context_starts_at_attempt_one_without_feedback() {
        let ctx = AttemptContext::new(3);
        assert_eq!(ctx.attempt, 1);
        assert!(ctx.feedback().is_none());
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        assert_eq!(AttemptContext::new(0).max_attempts, 1);
    }

    #[test]
    fn fail_retries_until_budget_spent() {
        let mut ctx = AttemptContext::new(2);
        let next = ctx.fail("a = 1".into(), classified("SyntaxError: bad"));
        assert!(matches!(next, LoopState::Retrying));
        ctx.attempt += 1;

        let feedback = ctx.feedback().unwrap();
        assert_eq!(feedback.attempt, 1);
        assert_eq!(feedback.previous_code, "a = 1");
        assert_eq!(feedback.error.category, ErrorCategory::SyntaxError);

        let next = ctx.fail("a = 2".into(), classified("boom"));
        assert!(matches!(next, LoopState::Exhausted));
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.last_code.as_deref(), Some("a = 2"));
    }

    #[test]
    fn state_names() {
        assert_eq!(LoopState::Generating.name(), "Generating");
        assert_eq!(LoopState::Exhausted.name(), "Exhausted");
    }
}
