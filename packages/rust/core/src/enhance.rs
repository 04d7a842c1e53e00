//! Enhancer: refine the structured document chunk by chunk with a backend.
//!
//! Every chunk is validated against its input. Output that comes back
//! empty, drops a link, or links anywhere the input did not is discarded
//! and the unenhanced chunk is kept instead. A section chunk must also
//! list each URL once; the Topic Index may only link into the hierarchy.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use llmstxt_backends::{GenerateRequest, GenerativeBackend};
use llmstxt_document::{
    Chunk, ChunkKind, extract_urls, join_blocks, missing_urls, repeated_urls, section_chunks,
    strip_code_fences, topic_index_chunk,
};
use llmstxt_shared::{CancelFlag, SiteStructure};

const SYSTEM_PROMPT: &str =
    "You organize website site maps into concise, link-preserving reference documents for AI assistants.";

/// Inputs for [`enhance`].
#[derive(Debug, Clone)]
pub struct EnhanceOptions {
    pub site_name: String,
    /// Upper bound on a single chunk's rendered size.
    pub max_chunk_chars: usize,
}

/// Why a chunk was kept unenhanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFallback {
    pub label: String,
    pub reason: String,
}

/// What happened to each chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceReport {
    /// Chunks replaced by backend output.
    pub enhanced: usize,
    /// Chunks whose backend output was rejected.
    pub fallbacks: Vec<ChunkFallback>,
    /// Chunks never sent (no backend, or cancelled).
    pub skipped: usize,
}

impl EnhanceReport {
    pub fn total(&self) -> usize {
        self.enhanced + self.fallbacks.len() + self.skipped
    }
}

/// Enhanced document body plus per-chunk accounting.
#[derive(Debug, Clone)]
pub struct Enhanced {
    pub body: String,
    pub report: EnhanceReport,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for the enhancement phase.
pub trait EnhanceProgress: Send + Sync {
    /// Called before each chunk is sent to the backend.
    fn chunk_started(&self, label: &str, current: usize, total: usize);
}

/// No-op progress reporter.
pub struct SilentEnhanceProgress;

impl EnhanceProgress for SilentEnhanceProgress {
    fn chunk_started(&self, _label: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Enhancement
// ---------------------------------------------------------------------------

/// Enhance `structure` section by section, then the Topic Index.
///
/// Never fails: backend errors and rejected output degrade to the
/// unenhanced chunk. With no backend, the body equals the structurer's
/// rendering.
#[instrument(skip_all, fields(site = %options.site_name, sections = structure.sections.len()))]
pub async fn enhance(
    structure: &SiteStructure,
    backend: Option<&dyn GenerativeBackend>,
    options: &EnhanceOptions,
    cancel: &CancelFlag,
    progress: &dyn EnhanceProgress,
) -> Enhanced {
    let sections = section_chunks(structure, options.max_chunk_chars);
    let topics = topic_index_chunk(structure);
    let total = sections.len() + usize::from(topics.is_some());

    let mut report = EnhanceReport::default();
    let mut blocks = Vec::with_capacity(total);

    for (i, chunk) in sections.iter().enumerate() {
        progress.chunk_started(&chunk.label, i + 1, total);
        let text = enhance_chunk(chunk, backend, options, None, cancel, &mut report).await;
        blocks.push(text);
    }

    if let Some(chunk) = topics {
        progress.chunk_started(&chunk.label, total, total);
        let hierarchy = join_blocks(&blocks);
        let permitted: HashSet<String> = extract_urls(&hierarchy).into_iter().collect();
        let text =
            enhance_chunk(&chunk, backend, options, Some(&permitted), cancel, &mut report).await;
        blocks.push(text);
    }

    info!(
        enhanced = report.enhanced,
        fallbacks = report.fallbacks.len(),
        skipped = report.skipped,
        "enhancement finished"
    );

    Enhanced {
        body: join_blocks(&blocks),
        report,
    }
}

async fn enhance_chunk(
    chunk: &Chunk,
    backend: Option<&dyn GenerativeBackend>,
    options: &EnhanceOptions,
    permitted: Option<&HashSet<String>>,
    cancel: &CancelFlag,
    report: &mut EnhanceReport,
) -> String {
    let Some(backend) = backend else {
        report.skipped += 1;
        return chunk.text.clone();
    };
    if cancel.is_cancelled() {
        debug!(chunk = %chunk.label, "cancelled, keeping chunk unenhanced");
        report.skipped += 1;
        return chunk.text.clone();
    }

    let request = GenerateRequest::new(chunk_prompt(chunk, &options.site_name))
        .with_system(SYSTEM_PROMPT)
        .with_max_tokens(8192)
        .with_temperature(0.2);

    let outcome = match backend.generate(&request).await {
        Ok(generation) => validate_output(chunk, &generation.text, permitted),
        Err(e) => Err(format!("backend error: {e}")),
    };

    match outcome {
        Ok(text) => {
            debug!(chunk = %chunk.label, "chunk enhanced");
            report.enhanced += 1;
            text
        }
        Err(reason) => {
            warn!(chunk = %chunk.label, %reason, "keeping chunk unenhanced");
            report.fallbacks.push(ChunkFallback {
                label: chunk.label.clone(),
                reason,
            });
            chunk.text.clone()
        }
    }
}

/// Accept backend output only if it keeps every input link and adds none.
///
/// Section output may link only to the chunk's own URLs, each once. Topic
/// Index output may link only to `permitted`.
fn validate_output(
    chunk: &Chunk,
    output: &str,
    permitted: Option<&HashSet<String>>,
) -> Result<String, String> {
    let text = strip_code_fences(output);
    if text.is_empty() {
        return Err("empty output".into());
    }

    let expected = chunk.urls();
    let missing = missing_urls(&expected, &text);
    if !missing.is_empty() {
        return Err(format!(
            "output dropped {} link(s), first: {}",
            missing.len(),
            missing[0]
        ));
    }

    match permitted {
        Some(permitted) => {
            if let Some(stray) = extract_urls(&text)
                .into_iter()
                .find(|url| !permitted.contains(url))
            {
                return Err(format!("topic index links outside the hierarchy: {stray}"));
            }
        }
        None => {
            let own: HashSet<&str> = expected.iter().map(String::as_str).collect();
            if let Some(added) = extract_urls(&text)
                .into_iter()
                .find(|url| !own.contains(url.as_str()))
            {
                return Err(format!("output added a link not in the input: {added}"));
            }
            if let Some(repeated) = repeated_urls(&text).into_iter().next() {
                return Err(format!("output lists a link more than once: {repeated}"));
            }
        }
    }

    Ok(text)
}

fn chunk_prompt(chunk: &Chunk, site_name: &str) -> String {
    let task = match chunk.kind {
        ChunkKind::Section => {
            "This is one section of the site map. Keep every heading line exactly as given, \
             add a one-sentence `> ` summary directly under the top heading if there is none, \
             and rewrite each entry's description."
        }
        ChunkKind::TopicIndex => {
            "This is the Topic Index. Keep the `## Topic Index` heading, keep or refine the \
             `### ` topic headings, and list under each topic only entries that already \
             appear below it."
        }
    };

    format!(
        "Refine part of the site map of {site_name}.\n\n\
         {task}\n\n\
         RULES:\n\
         - Preserve ALL original URLs exactly as given\n\
         - Keep every entry in the form `- [Title](URL): description`\n\
         - Write concise descriptions (under 15 words each) after the colon\n\
         - Do not add links that are not in the input\n\
         - Output ONLY the raw markdown. No code fences\n\n\
         Here is the content to refine:\n\n{}",
        chunk.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use llmstxt_backends::{BackendError, Generation};
    use llmstxt_document::render_body;
    use llmstxt_shared::{Entry, EntryRef, Section, Topic, TopicIndex};

    type Script = Box<dyn Fn(&GenerateRequest) -> Result<String, BackendError> + Send + Sync>;

    struct FakeBackend {
        script: Script,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(
            script: impl Fn(&GenerateRequest) -> Result<String, BackendError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerativeBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn label(&self) -> String {
            "Fake".into()
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<Generation, BackendError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            (self.script)(request).map(|text| Generation {
                text,
                model: "fake".into(),
            })
        }
    }

    fn entry(title: &str, url: &str) -> Entry {
        Entry {
            title: title.into(),
            url: url.into(),
            description: Some(format!("{title} page.")),
            children: vec![],
        }
    }

    fn site() -> SiteStructure {
        SiteStructure {
            sections: vec![
                Section {
                    slug: "about".into(),
                    title: "About".into(),
                    summary: None,
                    entries: vec![entry("History", "https://x.edu/about/history")],
                    subsections: vec![],
                },
                Section {
                    slug: "programs".into(),
                    title: "Programs".into(),
                    summary: None,
                    entries: vec![
                        entry("MBA", "https://x.edu/programs/mba"),
                        entry("MSF", "https://x.edu/programs/msf"),
                    ],
                    subsections: vec![],
                },
            ],
            topic_index: TopicIndex {
                topics: vec![Topic {
                    name: "Programs".into(),
                    entries: vec![EntryRef {
                        title: "MBA".into(),
                        url: "https://x.edu/programs/mba".into(),
                    }],
                }],
            },
        }
    }

    fn options() -> EnhanceOptions {
        EnhanceOptions {
            site_name: "X".into(),
            max_chunk_chars: 12_000,
        }
    }

    /// Echo the chunk back with every description replaced.
    fn rewrite(request: &GenerateRequest) -> Result<String, BackendError> {
        let content = request
            .prompt
            .split_once("Here is the content to refine:\n\n")
            .map(|(_, c)| c)
            .unwrap_or_default();
        Ok(format!(
            "```markdown\n{}\n```",
            content.replace(" page.", " – refined.")
        ))
    }

    #[tokio::test]
    async fn without_backend_output_equals_structurer_body() {
        let structure = site();
        let enhanced = enhance(
            &structure,
            None,
            &options(),
            &CancelFlag::new(),
            &SilentEnhanceProgress,
        )
        .await;

        assert_eq!(enhanced.body, render_body(&structure));
        assert_eq!(enhanced.report.skipped, 3);
        assert_eq!(enhanced.report.enhanced, 0);
    }

    #[tokio::test]
    async fn accepted_chunks_replace_input() {
        let backend = FakeBackend::new(rewrite);
        let enhanced = enhance(
            &site(),
            Some(&backend),
            &options(),
            &CancelFlag::new(),
            &SilentEnhanceProgress,
        )
        .await;

        assert_eq!(enhanced.report.enhanced, 3);
        assert!(enhanced.body.contains("[MBA](https://x.edu/programs/mba): MBA – refined."));
        assert!(!enhanced.body.contains("```"));
        assert!(enhanced.body.ends_with("- [MBA](https://x.edu/programs/mba)"));
    }

    #[tokio::test]
    async fn chunk_that_drops_a_url_falls_back() {
        let backend = FakeBackend::new(|request: &GenerateRequest| {
            if request.prompt.contains("- [MSF]") {
                Ok("## Programs\n\n- [MBA](https://x.edu/programs/mba): Only one.".into())
            } else {
                rewrite(request)
            }
        });
        let structure = site();
        let enhanced = enhance(
            &structure,
            Some(&backend),
            &options(),
            &CancelFlag::new(),
            &SilentEnhanceProgress,
        )
        .await;

        assert_eq!(enhanced.report.enhanced, 2);
        assert_eq!(enhanced.report.fallbacks.len(), 1);
        assert_eq!(enhanced.report.fallbacks[0].label, "Programs");
        assert!(enhanced.report.fallbacks[0].reason.contains("https://x.edu/programs/msf"));
        assert!(enhanced.body.contains("- [MSF](https://x.edu/programs/msf): MSF page."));
        for url in structure.entry_urls() {
            assert!(enhanced.body.contains(url));
        }
    }

    #[tokio::test]
    async fn section_output_with_added_or_repeated_links_falls_back() {
        let backend = FakeBackend::new(|request: &GenerateRequest| {
            let echoed = rewrite(request)?;
            if request.prompt.contains("- [History]") {
                Ok(format!(
                    "{echoed}\n- [Invented](https://x.edu/invented)\n- [Again](https://x.edu/about/history)"
                ))
            } else if request.prompt.contains("- [MSF]") {
                Ok(format!("{echoed}\n- [MBA again](https://x.edu/programs/mba): Repeat."))
            } else {
                Ok(echoed)
            }
        });
        let structure = site();
        let enhanced = enhance(
            &structure,
            Some(&backend),
            &options(),
            &CancelFlag::new(),
            &SilentEnhanceProgress,
        )
        .await;

        let labels: Vec<&str> = enhanced
            .report
            .fallbacks
            .iter()
            .map(|f| f.label.as_str())
            .collect();
        assert_eq!(labels, vec!["About", "Programs"]);
        assert!(enhanced.report.fallbacks[0].reason.contains("https://x.edu/invented"));
        assert!(enhanced.report.fallbacks[1].reason.contains("more than once"));
        assert_eq!(enhanced.report.enhanced, 1);
        assert!(!enhanced.body.contains("https://x.edu/invented"));
        assert_eq!(enhanced.body.matches("](https://x.edu/about/history)").count(), 1);
        assert_eq!(enhanced.body.matches("](https://x.edu/programs/mba)").count(), 2);
    }

    #[tokio::test]
    async fn backend_errors_degrade_per_chunk() {
        let backend = FakeBackend::new(|_: &GenerateRequest| Err(BackendError::Timeout));
        let structure = site();
        let enhanced = enhance(
            &structure,
            Some(&backend),
            &options(),
            &CancelFlag::new(),
            &SilentEnhanceProgress,
        )
        .await;

        assert_eq!(enhanced.body, render_body(&structure));
        assert_eq!(enhanced.report.fallbacks.len(), 3);
        assert_eq!(backend.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn topic_index_may_not_link_outside_hierarchy() {
        let backend = FakeBackend::new(|request: &GenerateRequest| {
            if request.prompt.contains("## Topic Index") {
                Ok("## Topic Index\n\n### Programs\n\n- [MBA](https://x.edu/programs/mba)\n- [Elsewhere](https://other.example/)".into())
            } else {
                rewrite(request)
            }
        });
        let enhanced = enhance(
            &site(),
            Some(&backend),
            &options(),
            &CancelFlag::new(),
            &SilentEnhanceProgress,
        )
        .await;

        assert_eq!(enhanced.report.fallbacks.len(), 1);
        assert_eq!(enhanced.report.fallbacks[0].label, "Topic Index");
        assert!(!enhanced.body.contains("other.example"));
    }

    #[tokio::test]
    async fn cancelled_run_sends_nothing() {
        let backend = FakeBackend::new(rewrite);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let enhanced = enhance(&site(), Some(&backend), &options(), &cancel, &SilentEnhanceProgress).await;

        assert_eq!(enhanced.report.skipped, 3);
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_output_is_rejected() {
        let chunk = Chunk {
            kind: ChunkKind::Section,
            label: "About".into(),
            text: "## About\n\n- [History](https://x.edu/about/history)".into(),
        };
        assert_eq!(
            validate_output(&chunk, "```\n```", None),
            Err("empty output".to_string())
        );
    }
}
