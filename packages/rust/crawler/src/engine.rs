//! Bounded breadth-first crawler.
//!
//! The crawler starts from a root URL and walks the frontier in discovery
//! order, one request at a time, with a minimum delay between fetches. Every
//! normalized URL is fetched at most once and the total number of fetches
//! never exceeds `max_pages`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use llmstxt_shared::{CancelFlag, CrawlConfig, FetchStatus, LlmsTxtError, Pacer, Page, Result};

use crate::fetch::Fetcher;
use crate::scope::{ScopePredicate, normalize_url};

// ---------------------------------------------------------------------------
// CrawlOutcome
// ---------------------------------------------------------------------------

/// Summary of a finished (or interrupted) crawl.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Visited pages in fetch order, including failed ones.
    pub pages: Vec<Page>,
    /// Number of pages fetched successfully.
    pub pages_fetched: usize,
    /// Number of fetch attempts that failed.
    pub pages_failed: usize,
    /// Discovered links rejected by the scope predicate.
    pub skipped_out_of_scope: usize,
    /// Discovered links that were already visited or queued.
    pub duplicates: usize,
    /// Total duration of the crawl.
    pub duration: Duration,
    /// Whether the crawl stopped early on an interrupt.
    pub cancelled: bool,
}

impl CrawlOutcome {
    /// Successfully fetched pages, in fetch order.
    pub fn ok_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(|p| p.is_ok())
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Callback for reporting crawl progress.
pub trait CrawlProgress: Send + Sync {
    /// Called after every fetch attempt.
    fn page_fetched(&self, url: &str, current: usize, max_pages: usize);
    /// Called when a fetch attempt fails.
    fn page_failed(&self, url: &str, error: &str);
}

/// No-op progress reporter.
pub struct SilentCrawlProgress;

impl CrawlProgress for SilentCrawlProgress {
    fn page_fetched(&self, _url: &str, _current: usize, _max_pages: usize) {}
    fn page_failed(&self, _url: &str, _error: &str) {}
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Sequential, scope-aware web crawler.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    pacer: Pacer,
}

impl Crawler {
    pub fn new(config: CrawlConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let pacer = Pacer::new(config.delay);
        Self {
            config,
            fetcher,
            pacer,
        }
    }

    /// Crawl breadth-first from `root`.
    ///
    /// Failed fetches are recorded and never abort the crawl. When `cancel`
    /// is set the crawl stops before the next fetch and returns what it has.
    #[instrument(skip_all, fields(root = %root, max_pages = self.config.max_pages))]
    pub async fn crawl(
        &self,
        root: &Url,
        scope: &dyn ScopePredicate,
        cancel: &CancelFlag,
        progress: &dyn CrawlProgress,
    ) -> Result<CrawlOutcome> {
        let start_time = Instant::now();
        let max_pages = self.config.max_pages;

        let root_key = normalize_url(root).ok_or_else(|| {
            LlmsTxtError::validation(format!("root URL must be http(s) with a host: {root}"))
        })?;
        let root_url = Url::parse(&root_key)
            .map_err(|e| LlmsTxtError::validation(format!("invalid root URL {root}: {e}")))?;
        if !scope.allows(&root_url) {
            return Err(LlmsTxtError::validation(format!(
                "root URL {root_key} is outside the crawl scope"
            )));
        }

        let mut frontier: VecDeque<(Url, String, u32)> = VecDeque::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();

        let mut outcome = CrawlOutcome {
            pages: Vec::new(),
            pages_fetched: 0,
            pages_failed: 0,
            skipped_out_of_scope: 0,
            duplicates: 0,
            duration: Duration::ZERO,
            cancelled: false,
        };

        if max_pages > 0 {
            queued.insert(root_key.clone());
            frontier.push_back((root_url, root_key, 0));
        }

        info!(
            max_pages,
            delay_ms = self.config.delay.as_millis() as u64,
            "starting crawl"
        );

        while let Some((url, key, depth)) = frontier.pop_front() {
            if visited.len() >= max_pages {
                break;
            }
            if cancel.is_cancelled() {
                info!(visited = visited.len(), "crawl interrupted");
                outcome.cancelled = true;
                break;
            }
            queued.remove(&key);
            if !visited.insert(key.clone()) {
                outcome.duplicates += 1;
                continue;
            }

            self.pacer.wait().await;
            let result = self.fetcher.fetch(&url).await;
            let fetched_at = Utc::now();
            let path_segments = path_segments(&url);

            let page = match result {
                Ok(doc) => {
                    debug!(url = %key, depth, links = doc.links.len(), "page fetched");

                    let mut links: Vec<String> = Vec::with_capacity(doc.links.len());
                    for link in &doc.links {
                        let Some((link_url, link_key)) = normalize_link(link) else {
                            continue;
                        };
                        if !links.contains(&link_key) {
                            links.push(link_key.clone());
                        }
                        if visited.contains(&link_key) || queued.contains(&link_key) {
                            outcome.duplicates += 1;
                            continue;
                        }
                        if !scope.allows(&link_url) {
                            debug!(link = %link_key, "out of scope, skipping");
                            outcome.skipped_out_of_scope += 1;
                            continue;
                        }
                        if visited.len() + frontier.len() >= max_pages {
                            continue;
                        }
                        queued.insert(link_key.clone());
                        frontier.push_back((link_url, link_key, depth + 1));
                    }

                    outcome.pages_fetched += 1;
                    Page {
                        url: key.clone(),
                        path_segments,
                        depth,
                        status: FetchStatus::Ok {
                            http_status: doc.status,
                        },
                        content_hash: Some(compute_hash(&doc.text)),
                        title: doc.title,
                        heading: doc.heading,
                        meta_description: doc.meta_description,
                        text: doc.text,
                        links,
                        fetched_at,
                    }
                }
                Err(e) => {
                    warn!(url = %key, error = %e, "fetch failed, continuing");
                    progress.page_failed(&key, &e.to_string());
                    outcome.pages_failed += 1;
                    Page {
                        url: key.clone(),
                        path_segments,
                        depth,
                        status: FetchStatus::Failed {
                            error: e.to_string(),
                        },
                        title: None,
                        heading: None,
                        meta_description: None,
                        text: String::new(),
                        links: Vec::new(),
                        content_hash: None,
                        fetched_at,
                    }
                }
            };

            outcome.pages.push(page);
            progress.page_fetched(&key, visited.len(), max_pages);
        }

        outcome.duration = start_time.elapsed();

        info!(
            pages_fetched = outcome.pages_fetched,
            pages_failed = outcome.pages_failed,
            skipped = outcome.skipped_out_of_scope,
            duplicates = outcome.duplicates,
            cancelled = outcome.cancelled,
            duration_ms = outcome.duration.as_millis() as u64,
            "crawl completed"
        );

        Ok(outcome)
    }
}

/// Parse a discovered link and reduce it to its dedup key.
fn normalize_link(link: &str) -> Option<(Url, String)> {
    let parsed = Url::parse(link).ok()?;
    let key = normalize_url(&parsed)?;
    let url = Url::parse(&key).ok()?;
    Some((url, key))
}

/// Non-empty path segments of a URL.
fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
