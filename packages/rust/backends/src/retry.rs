//! Bounded retry with exponential backoff for transient backend failures.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use llmstxt_shared::BackendsConfig;

use crate::backend::{GenerateRequest, Generation, GenerativeBackend};
use crate::error::BackendError;

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&BackendsConfig> for RetryPolicy {
    fn from(config: &BackendsConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Decorates a backend with [`RetryPolicy`]. Exhaustion returns the last error.
pub struct RetryingBackend {
    inner: Arc<dyn GenerativeBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn GenerativeBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for RetryingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn label(&self) -> String {
        self.inner.label()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, BackendError> {
        let mut retry = 0;
        loop {
            match self.inner.generate(request).await {
                Ok(generation) => return Ok(generation),
                Err(e) if e.is_transient() && retry < self.policy.max_retries => {
                    let delay = self.policy.backoff(retry);
                    warn!(
                        backend = self.inner.name(),
                        error = %e,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient backend error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
