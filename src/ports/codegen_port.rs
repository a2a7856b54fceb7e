//! Code generation port trait.

use crate::domain::error::CodeGenError;

/// Turns one prompt into one completion. Implementations make a single
/// request per call; retrying is the caller's business.
pub trait CodeGenPort {
    fn generate(&self, prompt: &str) -> Result<String, CodeGenError>;
}
