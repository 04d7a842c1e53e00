//! Site crawling for llmstxt.
//!
//! This crate provides:
//! - [`Fetcher`]: the fetch capability, with the reqwest-backed [`HttpFetcher`]
//! - [`CrawlScope`] / [`ScopePredicate`]: which discovered URLs belong to a crawl
//! - [`Crawler`]: sequential, rate-limited, breadth-first traversal

pub mod engine;
pub mod fetch;
pub mod scope;

pub use engine::{CrawlOutcome, CrawlProgress, Crawler, SilentCrawlProgress};
pub use fetch::{FetchedDocument, Fetcher, HttpFetcher, collapse_whitespace, parse_html};
pub use scope::{CrawlScope, ScopePredicate, normalize_url};
