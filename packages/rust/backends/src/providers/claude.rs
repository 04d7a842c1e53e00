//! Anthropic Messages API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use llmstxt_shared::{ApiKey, Result};

use crate::backend::{GenerateRequest, Generation, GenerativeBackend};
use crate::error::BackendError;
use crate::providers::{build_client, endpoint, send_json};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Claude via the Anthropic Messages API.
pub struct ClaudeBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl ClaudeBackend {
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
impl GenerativeBackend for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    fn label(&self) -> String {
        format!("Claude ({})", self.model)
    }

    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<Generation, BackendError> {
        debug!(model = %self.model, prompt_chars = request.prompt.len(), "claude request");

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response: MessagesResponse = send_json(
            self.client
                .post(endpoint(&self.base_url, "v1/messages"))
                .header("x-api-key", self.api_key.expose())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body),
        )
        .await?;

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(BackendError::malformed("response contained no text"));
        }

        Ok(Generation {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
