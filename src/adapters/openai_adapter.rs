//! OpenAI-compatible chat-completions client.

use crate::domain::error::CodeGenError;
use crate::ports::codegen_port::CodeGenPort;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "o4-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Settings for [`OpenAiAdapter`]. `timeout` of `None` waits indefinitely.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout: Option<Duration>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout: None,
        }
    }
}

pub struct OpenAiAdapter {
    client: reqwest::blocking::Client,
    settings: OpenAiSettings,
    api_key: String,
}

impl OpenAiAdapter {
    /// Build a client, reading the key from the environment variable named
    /// in `settings.api_key_env`.
    pub fn from_env(settings: OpenAiSettings) -> Result<Self, CodeGenError> {
        let api_key = env::var(&settings.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CodeGenError::MissingApiKey {
                var: settings.api_key_env.clone(),
            })?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(
        settings: OpenAiSettings,
        api_key: impl Into<String>,
    ) -> Result<Self, CodeGenError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| CodeGenError::Request {
            reason: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            settings,
            api_key: api_key.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }
}

impl CodeGenPort for OpenAiAdapter {
    fn generate(&self, prompt: &str) -> Result<String, CodeGenError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        log::debug!(
            "requesting completion from {} ({} prompt chars)",
            self.settings.model,
            prompt.len()
        );
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| CodeGenError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().map_err(|e| CodeGenError::Request {
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(CodeGenError::Request {
                reason: format!("HTTP {status}: {}", text.trim()),
            });
        }
        parse_completion(&text)
    }
}

/// First choice's message content from a chat-completions response body.
fn parse_completion(body: &str) -> Result<String, CodeGenError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| CodeGenError::Request {
        reason: format!("invalid completion response: {e}"),
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(CodeGenError::EmptyCompletion)
}
