//! Shared types, error model, and configuration for llmstxt.
//!
//! This crate is the foundation depended on by all other llmstxt crates.
//! It provides:
//! - [`LlmsTxtError`]: the unified error type
//! - Domain types ([`Page`], [`SiteStructure`], [`StructuredDocument`], [`RunId`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], credentials, config loading)
//! - Request pacing and cancellation ([`Pacer`], [`CancelFlag`])

pub mod config;
pub mod error;
pub mod pacing;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiKey, AppConfig, BackendKind, BackendsConfig, BenchConfig, CrawlConfig, Credentials,
    GenerateConfig, ProviderConfig, ScoringWeights, TopicRule, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_credentials, validate_config,
};
pub use error::{LlmsTxtError, Result};
pub use pacing::{CancelFlag, Pacer};
pub use types::{
    CURRENT_DOCUMENT_VERSION, DocumentMetadata, Entry, EntryRef, FetchStatus, Page, RunId,
    Section, SiteStructure, StructuredDocument, Topic, TopicIndex,
};
