//! Provider implementations of [`GenerativeBackend`](crate::GenerativeBackend).

mod claude;
mod gemini;
mod openai;

pub use claude::ClaudeBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use llmstxt_shared::{LlmsTxtError, Result};

use crate::error::BackendError;

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("llmstxt/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client every provider uses; `timeout` applies per call.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| LlmsTxtError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send a request and decode a JSON body, mapping failures to [`BackendError`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> std::result::Result<T, BackendError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(BackendError::from_status(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| BackendError::malformed(format!("invalid JSON: {e}")))
}

/// Join an API root and a path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
