//! The Structured Document format.
//!
//! This crate provides:
//! - [`render`]: deterministic rendering of header, sections, and Topic Index
//! - [`parse`]: lenient parsing back into a [`SiteStructure`](llmstxt_shared::SiteStructure)
//! - [`links`]: link extraction and integrity checks
//! - [`chunk`]: splitting a structure into backend-sized chunks

pub mod chunk;
pub mod links;
pub mod parse;
pub mod render;

pub use chunk::{Chunk, ChunkKind, section_chunks, topic_index_chunk};
pub use links::{
    extract_urls, missing_urls, repeated_urls, strip_code_fences, validate_topic_index,
    validate_unique_entries,
};
pub use parse::{ParsedDocument, parse_document, slugify};
pub use render::{
    TOPIC_INDEX_HEADING, build_document, join_blocks, render_body, render_document,
    render_entry, render_header, render_section, render_topic_index,
};
