//! Application configuration for llmstxt.
//!
//! User config lives at `~/.llmstxt/llmstxt.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Credentials are never stored in the file: each backend names the
//! environment variable holding its key, and [`resolve_credentials`] reads
//! them once at startup into an explicit [`Credentials`] value.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LlmsTxtError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "llmstxt.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".llmstxt";

// ---------------------------------------------------------------------------
// Backend kinds
// ---------------------------------------------------------------------------

/// Supported generative-text providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Claude,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl BackendKind {
    /// Auto-detection preference order.
    pub const PREFERENCE: [BackendKind; 3] = [Self::Claude, Self::OpenAi, Self::Gemini];

    /// Short lowercase name used on the command line and in config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Claude => "Claude (Anthropic)",
            Self::OpenAi => "GPT (OpenAI)",
            Self::Gemini => "Gemini (Google)",
        }
    }

    fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Claude => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
            Self::Gemini => "gemini-2.0-flash",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = LlmsTxtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "openai" | "gpt" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(LlmsTxtError::config(format!(
                "unknown backend '{other}': expected claude, openai, or gemini"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching llmstxt.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generator defaults.
    #[serde(default)]
    pub generate: GenerateConfig,

    /// Benchmark defaults.
    #[serde(default)]
    pub bench: BenchConfig,

    /// Judge dimension weights.
    #[serde(default)]
    pub scoring: ScoringWeights,

    /// Topic keywords used to build the Topic Index.
    #[serde(default = "default_topics")]
    pub topics: Vec<TopicRule>,

    /// Generative backend settings.
    #[serde(default)]
    pub backends: BackendsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generate: GenerateConfig::default(),
            bench: BenchConfig::default(),
            scoring: ScoringWeights::default(),
            topics: default_topics(),
            backends: BackendsConfig::default(),
        }
    }
}

/// `[generate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Hard ceiling on pages fetched per crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Minimum ms between consecutive fetches.
    #[serde(default = "default_crawl_delay")]
    pub delay_ms: u64,

    /// Maximum section nesting depth (1 = sections only).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Whether to run the enhancer after structuring.
    #[serde(default = "default_true")]
    pub enhance: bool,

    /// Backend used by the enhancer.
    #[serde(default = "default_enhance_backend")]
    pub backend: BackendKind,

    /// Upper bound on characters sent to the backend per chunk.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// File extensions never fetched.
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,

    /// URL path include globs (empty = everything under the root path).
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// URL path exclude globs.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Allow crawling loopback/private hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,

    /// Output path for the Structured Document.
    #[serde(default = "default_generate_output")]
    pub output: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            delay_ms: default_crawl_delay(),
            max_depth: default_max_depth(),
            enhance: true,
            backend: default_enhance_backend(),
            max_chunk_chars: default_max_chunk_chars(),
            excluded_extensions: default_excluded_extensions(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            allow_private_hosts: false,
            output: default_generate_output(),
        }
    }
}

fn default_max_pages() -> usize {
    150
}
fn default_crawl_delay() -> u64 {
    200
}
fn default_max_depth() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_enhance_backend() -> BackendKind {
    BackendKind::Gemini
}
fn default_max_chunk_chars() -> usize {
    12_000
}
fn default_excluded_extensions() -> Vec<String> {
    [
        "pdf", "jpg", "jpeg", "png", "gif", "svg", "zip", "mp4", "mp3", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}
fn default_generate_output() -> String {
    "llms.txt".into()
}

/// `[bench]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Minimum ms between successive backend calls.
    #[serde(default = "default_bench_delay")]
    pub delay_ms: u64,

    /// Backend answering queries (`None` = auto-detect from credentials).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_backend: Option<BackendKind>,

    /// Backend judging answers (`None` = same as the answer backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_backend: Option<BackendKind>,

    /// Limit on queries run per benchmark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queries: Option<usize>,

    /// Characters of each answer quoted in the report.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Output path for the Markdown report.
    #[serde(default = "default_bench_output")]
    pub output: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_bench_delay(),
            answer_backend: None,
            judge_backend: None,
            max_queries: None,
            excerpt_chars: default_excerpt_chars(),
            output: default_bench_output(),
        }
    }
}

fn default_bench_delay() -> u64 {
    1_000
}
fn default_excerpt_chars() -> usize {
    500
}
fn default_bench_output() -> String {
    "benchmark-report.md".into()
}

/// `[scoring]` section: how the four judge dimensions combine into one figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_weight")]
    pub accuracy: f64,
    #[serde(default = "default_weight")]
    pub completeness: f64,
    #[serde(default = "default_weight")]
    pub specificity: f64,
    #[serde(default = "default_weight")]
    pub actionability: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            accuracy: 1.0,
            completeness: 1.0,
            specificity: 1.0,
            actionability: 1.0,
        }
    }
}

impl ScoringWeights {
    /// Weights in rubric order: accuracy, completeness, specificity, actionability.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.accuracy,
            self.completeness,
            self.specificity,
            self.actionability,
        ]
    }

    fn validate(&self) -> Result<()> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LlmsTxtError::config(
                "scoring weights must be finite and non-negative",
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(LlmsTxtError::config(
                "at least one scoring weight must be positive",
            ));
        }
        Ok(())
    }
}

fn default_weight() -> f64 {
    1.0
}

/// `[[topics]]` entry: a Topic Index heading and the keywords that file entries under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRule {
    pub name: String,
    pub keywords: Vec<String>,
}

fn default_topics() -> Vec<TopicRule> {
    let rule = |name: &str, keywords: &[&str]| TopicRule {
        name: name.into(),
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
    };
    vec![
        rule("About", &["about", "mission", "history", "leadership"]),
        rule(
            "Admissions",
            &["admission", "admissions", "apply", "application", "enroll"],
        ),
        rule(
            "Programs",
            &[
                "program", "programs", "degree", "degrees", "course", "courses", "curriculum",
                "certificate",
            ],
        ),
        rule(
            "Research",
            &["research", "lab", "labs", "center", "institute", "publications"],
        ),
        rule(
            "Careers",
            &["career", "careers", "job", "jobs", "internship", "recruiting"],
        ),
        rule("News & Events", &["news", "event", "events", "calendar"]),
        rule("People", &["faculty", "staff", "directory", "people"]),
        rule("Contact & Support", &["contact", "support", "help", "faq"]),
    ]
}

/// `[backends]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Cap on a single backoff delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "ProviderConfig::claude")]
    pub claude: ProviderConfig,

    #[serde(default = "ProviderConfig::openai")]
    pub openai: ProviderConfig,

    #[serde(default = "ProviderConfig::gemini")]
    pub gemini: ProviderConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            claude: ProviderConfig::claude(),
            openai: ProviderConfig::openai(),
            gemini: ProviderConfig::gemini(),
        }
    }
}

impl BackendsConfig {
    /// Settings for one provider.
    pub fn provider(&self, kind: BackendKind) -> &ProviderConfig {
        match kind {
            BackendKind::Claude => &self.claude,
            BackendKind::OpenAi => &self.openai,
            BackendKind::Gemini => &self.gemini,
        }
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8_000
}

/// `[backends.<provider>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name of the env var holding the API key (never store the key itself).
    pub api_key_env: String,

    /// Model identifier.
    pub model: String,

    /// Override for the provider's API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    fn for_kind(kind: BackendKind) -> Self {
        Self {
            api_key_env: kind.default_api_key_env().into(),
            model: kind.default_model().into(),
            base_url: None,
        }
    }

    fn claude() -> Self {
        Self::for_kind(BackendKind::Claude)
    }

    fn openai() -> Self {
        Self::for_kind(BackendKind::OpenAi)
    }

    fn gemini() -> Self {
        Self::for_kind(BackendKind::Gemini)
    }
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hard ceiling on pages fetched.
    pub max_pages: usize,
    /// Minimum delay between consecutive fetches.
    pub delay: Duration,
    /// File extensions never fetched (lowercase, no dot).
    pub excluded_extensions: Vec<String>,
    /// URL path include glob patterns.
    pub include_patterns: Vec<String>,
    /// URL path exclude glob patterns.
    pub exclude_patterns: Vec<String>,
    /// Allow loopback/private hosts.
    pub allow_private_hosts: bool,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_pages: config.generate.max_pages,
            delay: Duration::from_millis(config.generate.delay_ms),
            excluded_extensions: config.generate.excluded_extensions.clone(),
            include_patterns: config.generate.include_patterns.clone(),
            exclude_patterns: config.generate.exclude_patterns.clone(),
            allow_private_hosts: config.generate.allow_private_hosts,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.llmstxt/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| LlmsTxtError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.llmstxt/llmstxt.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LlmsTxtError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LlmsTxtError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LlmsTxtError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LlmsTxtError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LlmsTxtError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject numeric settings that would make a run meaningless.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.generate.max_pages == 0 {
        return Err(LlmsTxtError::config("max_pages must be at least 1"));
    }
    if config.generate.max_depth == 0 {
        return Err(LlmsTxtError::config("max_depth must be at least 1"));
    }
    if config.generate.max_chunk_chars < 256 {
        return Err(LlmsTxtError::config("max_chunk_chars must be at least 256"));
    }
    if config.bench.max_queries == Some(0) {
        return Err(LlmsTxtError::config("max_queries must be at least 1"));
    }
    if config.backends.timeout_secs == 0 {
        return Err(LlmsTxtError::config("backend timeout must be at least 1 second"));
    }
    for topic in &config.topics {
        if topic.name.trim().is_empty() || topic.keywords.is_empty() {
            return Err(LlmsTxtError::config(
                "every topic needs a name and at least one keyword",
            ));
        }
    }
    config.scoring.validate()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Keys for the backends selected at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    claude: Option<ApiKey>,
    openai: Option<ApiKey>,
    gemini: Option<ApiKey>,
}

impl Credentials {
    pub fn get(&self, kind: BackendKind) -> Option<&ApiKey> {
        match kind {
            BackendKind::Claude => self.claude.as_ref(),
            BackendKind::OpenAi => self.openai.as_ref(),
            BackendKind::Gemini => self.gemini.as_ref(),
        }
    }

    pub fn insert(&mut self, kind: BackendKind, key: ApiKey) {
        let slot = match kind {
            BackendKind::Claude => &mut self.claude,
            BackendKind::OpenAi => &mut self.openai,
            BackendKind::Gemini => &mut self.gemini,
        };
        *slot = Some(key);
    }

    /// The first backend (Claude, OpenAI, Gemini) with a key.
    pub fn detect(&self) -> Option<BackendKind> {
        BackendKind::PREFERENCE
            .into_iter()
            .find(|kind| self.get(*kind).is_some())
    }

    /// Fail with a config error naming the first of `kinds` without a key.
    pub fn require(&self, config: &AppConfig, kinds: &[BackendKind]) -> Result<()> {
        match kinds.iter().find(|kind| self.get(**kind).is_none()) {
            Some(kind) => Err(LlmsTxtError::config(format!(
                "{} API key not found. Set the {} environment variable.",
                kind.label(),
                config.backends.provider(*kind).api_key_env
            ))),
            None => Ok(()),
        }
    }
}

/// Read every provider's key from the environment once.
///
/// Each of `kinds` must have a non-empty key; the first missing one is
/// reported as a config error. Keys of other providers are kept when set,
/// so `auto` selection can use [`Credentials::detect`].
pub fn resolve_credentials(config: &AppConfig, kinds: &[BackendKind]) -> Result<Credentials> {
    resolve_credentials_with(config, kinds, |name| std::env::var(name).ok())
}

fn resolve_credentials_with(
    config: &AppConfig,
    kinds: &[BackendKind],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let mut credentials = Credentials::default();
    for kind in BackendKind::PREFERENCE {
        let var_name = &config.backends.provider(kind).api_key_env;
        if let Some(val) = lookup(var_name).filter(|v| !v.trim().is_empty()) {
            credentials.insert(kind, ApiKey::new(val.trim()));
        }
    }
    credentials.require(config, kinds)?;
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_pages"));
        assert!(toml_str.contains("ANTHROPIC_API_KEY"));
        assert!(toml_str.contains("[[topics]]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.generate.max_pages, 150);
        assert_eq!(parsed.generate.backend, BackendKind::Gemini);
        assert_eq!(parsed.backends.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(parsed.topics, config.topics);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[generate]
max_pages = 20

[bench]
answer_backend = "openai"

[scoring]
accuracy = 2.0

[[topics]]
name = "Admissions"
keywords = ["apply"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.generate.max_pages, 20);
        assert_eq!(config.generate.delay_ms, 200);
        assert_eq!(config.bench.answer_backend, Some(BackendKind::OpenAi));
        assert_eq!(config.bench.judge_backend, None);
        assert_eq!(config.scoring.as_array(), [2.0, 1.0, 1.0, 1.0]);
        assert_eq!(config.topics.len(), 1);
        assert_eq!(config.backends.claude.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn crawl_config_from_app_config() {
        let app = AppConfig::default();
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.max_pages, 150);
        assert_eq!(crawl.delay, Duration::from_millis(200));
        assert!(crawl.excluded_extensions.contains(&"pdf".to_string()));
        assert!(!crawl.allow_private_hosts);
    }

    #[test]
    fn backend_kind_parsing() {
        assert_eq!("Claude".parse::<BackendKind>().unwrap(), BackendKind::Claude);
        assert_eq!("gpt".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        assert_eq!("google".parse::<BackendKind>().unwrap(), BackendKind::Gemini);
        assert!("llama".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn validation_rejects_bad_numbers() {
        let mut config = AppConfig::default();
        assert!(validate_config(&config).is_ok());

        config.generate.max_pages = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.scoring = ScoringWeights {
            accuracy: 0.0,
            completeness: 0.0,
            specificity: 0.0,
            actionability: 0.0,
        };
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.scoring.specificity = f64::NAN;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.bench.max_queries = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_credential_is_a_config_error() {
        let config = AppConfig::default();
        let result = resolve_credentials_with(&config, &[BackendKind::Claude], |_| None);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        assert!(matches!(err, LlmsTxtError::Config { .. }));
    }

    #[test]
    fn empty_credential_is_rejected() {
        let config = AppConfig::default();
        let result =
            resolve_credentials_with(&config, &[BackendKind::Gemini], |_| Some("  ".into()));
        assert!(result.is_err());
    }

    #[test]
    fn credentials_hold_only_keys_that_are_set() {
        let config = AppConfig::default();
        let creds = resolve_credentials_with(&config, &[BackendKind::OpenAi], |name| {
            (name == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        })
        .expect("resolve");
        assert_eq!(creds.get(BackendKind::OpenAi).unwrap().expose(), "sk-test");
        assert!(creds.get(BackendKind::Claude).is_none());
        assert_eq!(format!("{:?}", creds.get(BackendKind::OpenAi).unwrap()), "ApiKey(****)");
    }

    #[test]
    fn detection_prefers_claude_then_openai() {
        let config = AppConfig::default();
        let creds = resolve_credentials_with(&config, &[], |name| {
            matches!(name, "OPENAI_API_KEY" | "GOOGLE_API_KEY").then(|| "k".to_string())
        })
        .expect("resolve");
        assert_eq!(creds.detect(), Some(BackendKind::OpenAi));

        let creds = resolve_credentials_with(&config, &[], |_| Some("k".into())).expect("resolve");
        assert_eq!(creds.detect(), Some(BackendKind::Claude));

        let creds = resolve_credentials_with(&config, &[], |_| None).expect("resolve");
        assert_eq!(creds.detect(), None);
    }

    #[test]
    fn detected_keys_can_be_required_later() {
        let config = AppConfig::default();
        let creds = resolve_credentials_with(&config, &[], |name| {
            (name == "GOOGLE_API_KEY").then(|| "g".to_string())
        })
        .expect("resolve");

        assert!(creds.require(&config, &[BackendKind::Gemini]).is_ok());
        let err = creds
            .require(&config, &[BackendKind::Gemini, BackendKind::Claude])
            .unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
