//! Google Gemini `generateContent` API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use llmstxt_shared::{ApiKey, Result};

use crate::backend::{GenerateRequest, Generation, GenerativeBackend};
use crate::error::BackendError;
use crate::providers::{build_client, endpoint, send_json};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: [Content; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

/// Gemini via the Generative Language API.
pub struct GeminiBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiBackend {
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
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn label(&self) -> String {
        format!("Gemini ({})", self.model)
    }

    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<Generation, BackendError> {
        debug!(model = %self.model, prompt_chars = request.prompt.len(), "gemini request");

        // The API takes a single text turn; the system prompt leads it.
        let text = match request.system.as_deref() {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };

        let body = GenerateContentRequest {
            contents: [Content {
                parts: vec![Part { text: Some(text) }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let url = endpoint(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.model),
        );
        let response: GenerateContentResponse = send_json(
            self.client
                .post(url)
                .query(&[("key", self.api_key.expose())])
                .json(&body),
        )
        .await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(BackendError::malformed("response contained no candidate text"));
        }

        Ok(Generation {
            text,
            model: response.model_version.unwrap_or_else(|| self.model.clone()),
        })
    }
}
