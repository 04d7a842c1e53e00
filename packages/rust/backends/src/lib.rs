//! Generative-text backends for llmstxt.
//!
//! This crate provides:
//! - [`GenerativeBackend`]: the prompt → text capability
//! - [`ClaudeBackend`], [`OpenAiBackend`], [`GeminiBackend`]: provider implementations
//! - [`RetryingBackend`]: bounded retry with exponential backoff for transient errors
//! - [`build_backend`]: startup-time selection from config and credentials

pub mod backend;
pub mod error;
pub mod factory;
pub mod providers;
pub mod retry;

pub use backend::{GenerateRequest, Generation, GenerativeBackend};
pub use error::BackendError;
pub use factory::build_backend;
pub use providers::{ClaudeBackend, GeminiBackend, OpenAiBackend};
pub use retry::{RetryPolicy, RetryingBackend};
