//! Construct a configured backend once, at startup.

use std::sync::Arc;

use tracing::debug;

use llmstxt_shared::{BackendKind, BackendsConfig, Credentials, LlmsTxtError, Result};

use crate::backend::GenerativeBackend;
use crate::providers::{ClaudeBackend, GeminiBackend, OpenAiBackend};
use crate::retry::{RetryPolicy, RetryingBackend};

/// Build the provider for `kind`, wrapped in the configured retry policy.
///
/// Fails with a config error when `credentials` has no key for `kind`.
pub fn build_backend(
    kind: BackendKind,
    config: &BackendsConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn GenerativeBackend>> {
    let api_key = credentials.get(kind).cloned().ok_or_else(|| {
        LlmsTxtError::config(format!("no credentials resolved for {}", kind.label()))
    })?;
    let provider = config.provider(kind);
    let model = provider.model.clone();
    let base_url = provider.base_url.clone();
    let timeout = config.timeout();

    let inner: Arc<dyn GenerativeBackend> = match kind {
        BackendKind::Claude => Arc::new(ClaudeBackend::new(api_key, model, base_url, timeout)?),
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new(api_key, model, base_url, timeout)?),
        BackendKind::Gemini => Arc::new(GeminiBackend::new(api_key, model, base_url, timeout)?),
    };
    debug!(backend = %kind, label = %inner.label(), "backend ready");

    Ok(Arc::new(RetryingBackend::new(inner, RetryPolicy::from(config))))
}
