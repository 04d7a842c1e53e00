//! The generative-text capability.

use crate::error::BackendError;

/// One prompt sent to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Optional system instruction.
    pub system: Option<String>,
    /// User prompt.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: 0.3,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A backend's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Model that produced the text, as reported by the provider.
    pub model: String,
}

/// A provider that turns a prompt into text, or fails.
#[async_trait::async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Short provider name (`claude`, `openai`, `gemini`).
    fn name(&self) -> &str;

    /// Display label including the model, e.g. `Claude (claude-sonnet-4-20250514)`.
    fn label(&self) -> String;

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, BackendError>;
}
