//! Core pipeline orchestration and domain logic for llmstxt.
//!
//! This crate ties together crawling, structuring, enhancement, and output
//! into the end-to-end `generate` workflow.

pub mod assembler;
pub mod enhance;
pub mod pipeline;
pub mod structure;

pub use assembler::{ArtifactMeta, write_atomic};
pub use enhance::{
    ChunkFallback, EnhanceOptions, EnhanceProgress, EnhanceReport, Enhanced,
    SilentEnhanceProgress, enhance,
};
pub use pipeline::{
    FULL_OUTPUT_FILENAME, GenerateOptions, GenerateResult, ProgressReporter, SilentProgress,
    generate, site_name_from_url,
};
pub use structure::{StructureOptions, build_topic_index, section_label, structure};
