//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use llmstxt_backends::{GenerativeBackend, build_backend};
use llmstxt_bench::{
    BenchProgress, Harness, HarnessOptions, LlmAssistant, QueryOutcome, QueryState, ReportOptions,
    aggregate, default_queries, format_improvement, generate_or_default, limit_queries,
    load_queries, render_json, render_report,
};
use llmstxt_core::{GenerateOptions, GenerateResult, ProgressReporter, generate, write_atomic};
use llmstxt_crawler::{Fetcher, HttpFetcher};
use llmstxt_document::parse_document;
use llmstxt_shared::{
    AppConfig, BackendKind, CancelFlag, init_config, load_config, resolve_credentials,
    validate_config,
};
use tracing::{info, warn};
use url::Url;

/// Organization name used in default queries when the document has no title.
const FALLBACK_SITE_NAME: &str = "the organization";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// llmstxt: curated site maps for AI assistants.
#[derive(Parser)]
#[command(
    name = "llmstxt",
    version,
    about = "Crawl a website into an llms.txt site map and benchmark whether it improves AI answers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Backend choice for the benchmark; `auto` picks the first configured credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ApiChoice {
    Auto,
    Claude,
    Openai,
    Gemini,
}

impl ApiChoice {
    fn kind(self) -> Option<BackendKind> {
        match self {
            Self::Auto => None,
            Self::Claude => Some(BackendKind::Claude),
            Self::Openai => Some(BackendKind::OpenAi),
            Self::Gemini => Some(BackendKind::Gemini),
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a site and write its Structured Document.
    Generate(GenerateArgs),

    /// Measure whether a Structured Document improves assistant answers.
    Bench(BenchArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct GenerateArgs {
    /// Root URL to crawl.
    url: String,

    /// Site name for the title (defaults to the domain name).
    #[arg(short, long)]
    name: Option<String>,

    /// Maximum number of pages to fetch.
    #[arg(long)]
    max_pages: Option<usize>,

    /// Minimum delay between requests, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Maximum section nesting depth.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Write the draft document without backend enhancement.
    #[arg(long)]
    skip_enhance: bool,

    /// Backend used for enhancement: claude, openai, or gemini.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Output path (defaults to llms.txt).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also write the unenhanced llms-full.txt beside the output.
    #[arg(long)]
    full: bool,
}

#[derive(clap::Args)]
pub(crate) struct BenchArgs {
    /// Structured Document to benchmark (defaults to the generate output path).
    #[arg(long)]
    llms_txt: Option<PathBuf>,

    /// Use this fuller document as the answering context when it exists.
    #[arg(long)]
    full_txt: Option<PathBuf>,

    /// Backend that answers the queries.
    #[arg(long, value_enum)]
    api: Option<ApiChoice>,

    /// Backend that judges the answers (defaults to the answering backend).
    #[arg(long, value_enum)]
    judge_api: Option<ApiChoice>,

    /// JSON file of test queries.
    #[arg(long, conflicts_with = "auto_queries")]
    queries: Option<PathBuf>,

    /// Ask the answering backend to write queries from the document.
    #[arg(long)]
    auto_queries: bool,

    /// Run at most this many queries.
    #[arg(long)]
    max_queries: Option<usize>,

    /// Minimum delay between backend calls, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Markdown report path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the raw run and aggregate as JSON.
    #[arg(long)]
    json_output: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "llmstxt=info",
        1 => "llmstxt=debug",
        _ => "llmstxt=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => cmd_generate(args).await,
        Command::Bench(args) => cmd_bench(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// A cancel flag set by the first Ctrl-C.
fn cancel_on_interrupt() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing the in-flight request");
            flag.cancel();
        }
    });
    cancel
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let mut config = load_config()?;
    apply_generate_flags(&mut config, &args);
    validate_config(&config)?;

    let url = Url::parse(&args.url).map_err(|e| eyre!("invalid URL '{}': {e}", args.url))?;

    // Credentials are checked before any network activity.
    let backend: Option<Arc<dyn GenerativeBackend>> = if config.generate.enhance {
        let kind = config.generate.backend;
        let credentials = resolve_credentials(&config, &[kind])?;
        Some(build_backend(kind, &config.backends, &credentials)?)
    } else {
        None
    };

    let mut options = GenerateOptions::from_config(url, &config);
    options.site_name = args.name.clone();
    options.full = args.full;

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
    let cancel = cancel_on_interrupt();

    info!(
        url = %options.url,
        max_pages = options.crawl.max_pages,
        enhance = backend.is_some(),
        "generating site map"
    );

    let reporter = CliProgress::new();
    let result = generate(&options, fetcher, backend.as_deref(), &cancel, &reporter).await?;

    println!();
    println!("  Site map written!");
    println!("  Site:      {}", result.site_name);
    println!("  Path:      {}", result.artifact.path.display());
    println!("  Size:      {} bytes", result.artifact.size_bytes);
    println!("  SHA-256:   {}", result.artifact.sha256);
    if let Some(full) = &result.full_artifact {
        println!("  Full:      {}", full.path.display());
    }
    println!(
        "  Pages:     {} fetched, {} failed",
        result.pages_fetched, result.pages_failed
    );
    println!("  Entries:   {}", result.entries);
    println!("  Topics:    {}", result.topics);
    println!(
        "  Enhanced:  {}/{} chunks ({} fallback, {} skipped)",
        result.enhance.enhanced,
        result.enhance.total(),
        result.enhance.fallbacks.len(),
        result.enhance.skipped
    );
    for fallback in &result.enhance.fallbacks {
        println!("    - {}: {}", fallback.label, fallback.reason);
    }
    if result.cancelled {
        println!("  Note:      crawl interrupted, the map covers the pages fetched so far");
    }
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn apply_generate_flags(config: &mut AppConfig, args: &GenerateArgs) {
    let generate = &mut config.generate;
    if let Some(max_pages) = args.max_pages {
        generate.max_pages = max_pages;
    }
    if let Some(delay_ms) = args.delay_ms {
        generate.delay_ms = delay_ms;
    }
    if let Some(max_depth) = args.max_depth {
        generate.max_depth = max_depth;
    }
    if args.skip_enhance {
        generate.enhance = false;
    }
    if let Some(backend) = args.backend {
        generate.backend = backend;
    }
    if let Some(out) = &args.out {
        generate.output = out.display().to_string();
    }
}

// ---------------------------------------------------------------------------
// bench
// ---------------------------------------------------------------------------

async fn cmd_bench(args: BenchArgs) -> Result<()> {
    let mut config = load_config()?;
    apply_bench_flags(&mut config, &args);
    validate_config(&config)?;

    // Keys are read once; selected backends are required below.
    let credentials = resolve_credentials(&config, &[])?;
    let detected = credentials.detect();

    let answer_kind = select_backend(args.api, config.bench.answer_backend, detected, detected)
        .ok_or_else(|| {
            eyre!("no backend credential found; set an API key or pass --api claude|openai|gemini")
        })?;
    let judge_kind = select_backend(
        args.judge_api,
        config.bench.judge_backend,
        detected,
        Some(answer_kind),
    )
    .unwrap_or(answer_kind);

    credentials.require(&config, &[answer_kind, judge_kind])?;
    let answer_backend = build_backend(answer_kind, &config.backends, &credentials)?;
    let judge_backend = if judge_kind == answer_kind {
        Arc::clone(&answer_backend)
    } else {
        build_backend(judge_kind, &config.backends, &credentials)?
    };

    let llms_txt = args
        .llms_txt
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.generate.output));
    let document = read_document(&llms_txt)?;
    let (context_path, context, full_context) = match &args.full_txt {
        Some(path) if path.exists() => (path.clone(), read_document(path)?, true),
        Some(path) => {
            warn!(path = %path.display(), "full document not found, using the site map as context");
            (llms_txt.clone(), document.clone(), false)
        }
        None => (llms_txt.clone(), document.clone(), false),
    };

    let site_name = parse_document(&document)
        .ok()
        .map(|parsed| parsed.title)
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_SITE_NAME.to_string());

    let answerer = LlmAssistant::new(answer_backend);
    let judge = LlmAssistant::new(judge_backend);

    let queries = match &args.queries {
        Some(path) => load_queries(path)?,
        None if args.auto_queries => {
            generate_or_default(answerer.backend(), &document, &site_name).await
        }
        None => default_queries(&site_name),
    };
    let queries = limit_queries(queries, config.bench.max_queries);

    info!(
        queries = queries.len(),
        answerer = answer_kind.label(),
        judge = judge_kind.label(),
        context = %context_path.display(),
        "starting benchmark"
    );

    let harness = Harness::new(
        &answerer,
        &judge,
        HarnessOptions {
            delay: Duration::from_millis(config.bench.delay_ms),
            context_path: context_path.display().to_string(),
        },
    );
    let cancel = cancel_on_interrupt();
    let reporter = CliProgress::new();
    let run = harness.run(&queries, &context, &cancel, &reporter).await;
    reporter.finish();

    let summary = aggregate(&run, &config.scoring);
    let report = render_report(
        &run,
        &summary,
        &ReportOptions {
            excerpt_chars: config.bench.excerpt_chars,
            full_context,
            weights: config.scoring,
        },
    );
    let artifact = write_atomic(Path::new(&config.bench.output), &report)?;
    if let Some(json_path) = &args.json_output {
        write_atomic(json_path, &render_json(&run, &summary)?)?;
    }

    println!();
    println!("  Benchmark complete!");
    println!("  Report:    {}", artifact.path.display());
    if let Some(json_path) = &args.json_output {
        println!("  JSON:      {}", json_path.display());
    }
    println!(
        "  Queries:   {} scored, {} failed, {} not run",
        summary.scored, summary.failed, summary.not_run
    );
    println!(
        "  Overall:   {:.2} baseline, {:.2} with context",
        summary.baseline_overall, summary.enhanced_overall
    );
    println!("  Change:    {}", format_improvement(summary.improvement_pct));
    if run.cancelled {
        println!("  Note:      run interrupted");
    }
    println!();

    if summary.scored == 0 {
        return Err(eyre!(
            "no query was scored; see {} for failures",
            artifact.path.display()
        ));
    }
    Ok(())
}

/// Flag, then config, then `fallback`. An explicit `auto` flag skips the
/// config value and takes the detected backend.
fn select_backend(
    flag: Option<ApiChoice>,
    configured: Option<BackendKind>,
    detected: Option<BackendKind>,
    fallback: Option<BackendKind>,
) -> Option<BackendKind> {
    match flag {
        Some(ApiChoice::Auto) => detected,
        Some(choice) => choice.kind(),
        None => configured.or(fallback),
    }
}

fn apply_bench_flags(config: &mut AppConfig, args: &BenchArgs) {
    let bench = &mut config.bench;
    if let Some(max_queries) = args.max_queries {
        bench.max_queries = Some(max_queries);
    }
    if let Some(delay_ms) = args.delay_ms {
        bench.delay_ms = delay_ms;
    }
    if let Some(output) = &args.output {
        bench.output = output.display().to_string();
    }
}

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        eyre!(
            "cannot read {}: {e} (run `llmstxt generate <URL>` first)",
            path.display()
        )
    })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, max_pages: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{max_pages}] {url}"));
    }

    fn chunk_started(&self, label: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enhancing [{current}/{total}] {label}"));
    }

    fn done(&self, _result: &GenerateResult) {
        self.finish();
    }
}

impl BenchProgress for CliProgress {
    fn query_started(&self, index: usize, total: usize, query: &str) {
        self.spinner
            .set_message(format!("Query [{}/{total}] {query}", index + 1));
    }

    fn state_changed(&self, index: usize, state: QueryState) {
        let step = match state {
            QueryState::BaselineAnswered => "answering with context",
            QueryState::ContextAnswered => "judging",
            _ => return,
        };
        self.spinner
            .set_message(format!("Query [{}] {step}", index + 1));
    }

    fn query_finished(&self, index: usize, outcome: &QueryOutcome) {
        if let Some(failure) = &outcome.failure {
            self.spinner.println(format!(
                "  query {} failed at {}: {}",
                index + 1,
                failure.stage,
                failure.error
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn generate_flags_override_config() {
        let cli = parse(&[
            "llmstxt",
            "generate",
            "https://www.example.edu",
            "--max-pages",
            "50",
            "--delay-ms",
            "250",
            "--skip-enhance",
            "--backend",
            "claude",
            "--out",
            "out/map.txt",
        ]);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };

        let mut config = AppConfig::default();
        apply_generate_flags(&mut config, &args);
        assert_eq!(config.generate.max_pages, 50);
        assert_eq!(config.generate.delay_ms, 250);
        assert!(!config.generate.enhance);
        assert_eq!(config.generate.backend, BackendKind::Claude);
        assert_eq!(config.generate.output, "out/map.txt");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result =
            Cli::try_parse_from(["llmstxt", "generate", "https://a.edu", "--backend", "bard"]);
        assert!(result.is_err());
    }

    #[test]
    fn queries_and_auto_queries_conflict() {
        let result = Cli::try_parse_from([
            "llmstxt",
            "bench",
            "--queries",
            "q.json",
            "--auto-queries",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn bench_flags_override_config() {
        let cli = parse(&[
            "llmstxt",
            "-vv",
            "bench",
            "--api",
            "openai",
            "--max-queries",
            "3",
            "--output",
            "report.md",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Bench(args) = cli.command else {
            panic!("expected bench");
        };
        assert_eq!(args.api.and_then(ApiChoice::kind), Some(BackendKind::OpenAi));

        let mut config = AppConfig::default();
        apply_bench_flags(&mut config, &args);
        assert_eq!(config.bench.max_queries, Some(3));
        assert_eq!(config.bench.output, "report.md");
    }

    #[test]
    fn auto_api_defers_to_detection() {
        assert_eq!(ApiChoice::Auto.kind(), None);
        assert_eq!(ApiChoice::Claude.kind(), Some(BackendKind::Claude));
    }

    #[test]
    fn explicit_auto_overrides_configured_backend() {
        let configured = Some(BackendKind::Gemini);
        let detected = Some(BackendKind::Claude);

        assert_eq!(
            select_backend(Some(ApiChoice::Auto), configured, detected, detected),
            Some(BackendKind::Claude)
        );
        assert_eq!(
            select_backend(None, configured, detected, detected),
            Some(BackendKind::Gemini)
        );
        assert_eq!(
            select_backend(Some(ApiChoice::Openai), configured, detected, detected),
            Some(BackendKind::OpenAi)
        );
        assert_eq!(select_backend(None, None, None, None), None);
    }

    #[test]
    fn judge_falls_back_to_answering_backend() {
        let answer = Some(BackendKind::OpenAi);
        let detected = Some(BackendKind::Claude);

        assert_eq!(select_backend(None, None, detected, answer), answer);
        assert_eq!(
            select_backend(Some(ApiChoice::Auto), None, detected, answer),
            detected
        );
    }
}
