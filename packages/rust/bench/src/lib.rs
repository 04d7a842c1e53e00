//! Benchmark harness for llmstxt.
//!
//! Measures whether a Structured Document improves assistant answers:
//! - [`queries`]: load, synthesize, or default the query set
//! - [`assistant`]: the answer/judge capability over a generative backend
//! - [`harness`]: the per-query experiment state machine
//! - [`aggregate`]: weighted summary statistics
//! - [`report`]: Markdown and JSON rendering

pub mod aggregate;
pub mod assistant;
pub mod harness;
pub mod queries;
pub mod report;
pub mod types;

pub use aggregate::{Aggregate, DimensionSummary, aggregate};
pub use assistant::{AssistantBackend, LlmAssistant, parse_verdict};
pub use harness::{BenchProgress, Harness, HarnessOptions, SilentBenchProgress};
pub use queries::{
    AUTO_QUERY_COUNT, default_queries, generate_or_default, generate_queries, limit_queries,
    load_queries,
};
pub use report::{ReportOptions, format_improvement, render_json, render_report};
pub use types::{
    AnswerScore, BenchmarkRun, Dimension, JudgeVerdict, MAX_SCORE, Query, QueryFailure,
    QueryOutcome, QueryState,
};
