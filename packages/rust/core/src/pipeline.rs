//! End-to-end `generate` pipeline: URL → crawl → structure → enhance → write.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument, warn};
use url::Url;

use llmstxt_backends::GenerativeBackend;
use llmstxt_crawler::{CrawlProgress, CrawlScope, Crawler, Fetcher, normalize_url};
use llmstxt_document::{build_document, render_document, validate_topic_index, validate_unique_entries};
use llmstxt_shared::{
    AppConfig, CURRENT_DOCUMENT_VERSION, CancelFlag, CrawlConfig, DocumentMetadata, LlmsTxtError,
    Result, TopicRule,
};

use crate::assembler::{ArtifactMeta, write_atomic};
use crate::enhance::{EnhanceOptions, EnhanceProgress, EnhanceReport, enhance};
use crate::structure::{StructureOptions, structure};

/// File name of the unenhanced companion document.
pub const FULL_OUTPUT_FILENAME: &str = "llms-full.txt";

/// Configuration for the `generate` pipeline.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Root URL to crawl.
    pub url: Url,
    /// Site name for the title and header (derived from the host when `None`).
    pub site_name: Option<String>,
    /// Crawl configuration.
    pub crawl: CrawlConfig,
    /// Maximum section nesting.
    pub max_depth: usize,
    pub topics: Vec<TopicRule>,
    pub max_chunk_chars: usize,
    /// Where the Structured Document is written.
    pub output: PathBuf,
    /// Also write the unenhanced document as `llms-full.txt` beside `output`.
    pub full: bool,
}

impl GenerateOptions {
    /// Options for `url` from the `[generate]` config section.
    pub fn from_config(url: Url, config: &AppConfig) -> Self {
        Self {
            url,
            site_name: None,
            crawl: CrawlConfig::from(config),
            max_depth: config.generate.max_depth,
            topics: config.topics.clone(),
            max_chunk_chars: config.generate.max_chunk_chars,
            output: PathBuf::from(&config.generate.output),
            full: false,
        }
    }

    /// Path of the `--full` companion document.
    pub fn full_output_path(&self) -> PathBuf {
        match self.output.parent() {
            Some(dir) => dir.join(FULL_OUTPUT_FILENAME),
            None => PathBuf::from(FULL_OUTPUT_FILENAME),
        }
    }
}

/// Result of the `generate` pipeline.
#[derive(Debug)]
pub struct GenerateResult {
    pub site_name: String,
    /// The written Structured Document.
    pub artifact: ArtifactMeta,
    /// The written `llms-full.txt`, if requested.
    pub full_artifact: Option<ArtifactMeta>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// Entries in the hierarchy.
    pub entries: usize,
    pub topics: usize,
    pub enhance: EnhanceReport,
    /// Whether the crawl was interrupted.
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each fetch attempt.
    fn page_fetched(&self, url: &str, current: usize, max_pages: usize);
    /// Called before each chunk is sent to the backend.
    fn chunk_started(&self, label: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &GenerateResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _max_pages: usize) {}
    fn chunk_started(&self, _label: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &GenerateResult) {}
}

/// Run the full `generate` pipeline.
///
/// 1. Crawl from the root URL
/// 2. Structure pages into sections and a Topic Index
/// 3. Enhance chunk by chunk (when a backend is given)
/// 4. Write the document, and `llms-full.txt` when requested
///
/// Nothing is written when the crawl yields no successful page.
#[instrument(skip_all, fields(url = %options.url))]
pub async fn generate(
    options: &GenerateOptions,
    fetcher: Arc<dyn Fetcher>,
    backend: Option<&dyn GenerativeBackend>,
    cancel: &CancelFlag,
    progress: &dyn ProgressReporter,
) -> Result<GenerateResult> {
    let start = Instant::now();
    let site_name = options
        .site_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| site_name_from_url(&options.url));
    let base_url = normalize_url(&options.url).ok_or_else(|| {
        LlmsTxtError::validation(format!("root URL must be http(s) with a host: {}", options.url))
    })?;

    info!(%site_name, %base_url, "starting generate pipeline");

    // --- Phase 1: Crawl ---
    progress.phase("Crawling");
    let scope = CrawlScope::new(&options.url, &options.crawl);
    let crawler = Crawler::new(options.crawl.clone(), fetcher);
    let crawl = crawler
        .crawl(
            &options.url,
            &scope,
            cancel,
            &PipelineCrawlProgress { inner: progress },
        )
        .await?;

    if crawl.pages_fetched == 0 {
        return Err(LlmsTxtError::validation(format!(
            "no pages could be fetched from {base_url} ({} failed)",
            crawl.pages_failed
        )));
    }
    if crawl.cancelled {
        warn!(pages = crawl.pages_fetched, "crawl interrupted, continuing with collected pages");
    }

    // --- Phase 2: Structure ---
    progress.phase("Structuring");
    let structure = structure(
        &crawl.pages,
        &StructureOptions {
            site_name: site_name.clone(),
            max_depth: options.max_depth,
            topics: options.topics.clone(),
        },
    );
    validate_unique_entries(&structure)?;
    validate_topic_index(&structure)?;

    let metadata = DocumentMetadata {
        institution: site_name.clone(),
        website: base_url.clone(),
        generated: Utc::now().to_rfc3339(),
        version: CURRENT_DOCUMENT_VERSION.to_string(),
        description: format!("Curated map of {site_name} website content for AI assistants"),
        extra: Vec::new(),
    };
    let summary = format!("Site map of {site_name} ({base_url}), auto-generated for LLM context.");
    let draft = build_document(metadata, &site_name, summary, &structure);

    // --- Phase 3: Enhance ---
    if backend.is_some() {
        progress.phase("Enhancing");
    }
    let enhanced = enhance(
        &structure,
        backend,
        &EnhanceOptions {
            site_name: site_name.clone(),
            max_chunk_chars: options.max_chunk_chars,
        },
        cancel,
        &PipelineEnhanceProgress { inner: progress },
    )
    .await;

    // --- Phase 4: Write ---
    progress.phase("Writing");
    let mut document = draft.clone();
    document.body = enhanced.body;
    let rendered = render_document(&document);

    // The companion goes first so a failed write never leaves a lone llms.txt.
    let full_artifact = if options.full {
        Some(write_atomic(
            &options.full_output_path(),
            &render_document(&draft),
        )?)
    } else {
        None
    };
    let artifact = write_atomic(&options.output, &rendered)?;

    let result = GenerateResult {
        site_name,
        artifact,
        full_artifact,
        pages_fetched: crawl.pages_fetched,
        pages_failed: crawl.pages_failed,
        entries: structure.entry_count(),
        topics: structure.topic_index.topics.len(),
        enhance: enhanced.report,
        cancelled: crawl.cancelled,
        elapsed: start.elapsed(),
    };

    info!(
        path = %result.artifact.path.display(),
        entries = result.entries,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "generate pipeline complete"
    );
    progress.done(&result);

    Ok(result)
}

/// Second-level domain label, capitalised: `giesbusiness.illinois.edu` → `Illinois`.
pub fn site_name_from_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').collect();
    let label = if labels.len() > 1 {
        labels[labels.len() - 2]
    } else {
        host
    };

    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Progress adapters
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the crawler's progress interface.
struct PipelineCrawlProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl CrawlProgress for PipelineCrawlProgress<'_> {
    fn page_fetched(&self, url: &str, current: usize, max_pages: usize) {
        self.inner.page_fetched(url, current, max_pages);
    }

    fn page_failed(&self, url: &str, error: &str) {
        self.inner.phase(&format!("Failed {url}: {error}"));
    }
}

/// Adapts a `ProgressReporter` to the enhancer's progress interface.
struct PipelineEnhanceProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl EnhanceProgress for PipelineEnhanceProgress<'_> {
    fn chunk_started(&self, label: &str, current: usize, total: usize) {
        self.inner.chunk_started(label, current, total);
    }
}
