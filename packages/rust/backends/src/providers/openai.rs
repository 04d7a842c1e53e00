//! OpenAI Chat Completions API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use llmstxt_shared::{ApiKey, Result};

use crate::backend::{GenerateRequest, Generation, GenerativeBackend};
use crate::error::BackendError;
use crate::providers::{build_client, endpoint, send_json};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// GPT models via the OpenAI Chat Completions API.
pub struct OpenAiBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(
        api_key: ApiKey,
        model: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            model: model.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
        })
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn label(&self) -> String {
        format!("GPT ({})", self.model)
    }

    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<Generation, BackendError> {
        debug!(model = %self.model, prompt_chars = request.prompt.len(), "openai request");

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response: ChatResponse = send_json(
            self.client
                .post(endpoint(&self.base_url, "v1/chat/completions"))
                .bearer_auth(self.api_key.expose())
                .json(&body),
        )
        .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| BackendError::malformed("response contained no message content"))?;

        Ok(Generation {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
