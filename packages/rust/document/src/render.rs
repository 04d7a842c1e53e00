//! Structured Document rendering.
//!
//! Every function returns a block without a trailing newline; blocks are
//! joined with a blank line. [`render_document`] ends with a single newline.

use llmstxt_shared::{DocumentMetadata, Entry, Section, SiteStructure, StructuredDocument, TopicIndex};

/// Heading of the final cross-reference section.
pub const TOPIC_INDEX_HEADING: &str = "Topic Index";

const BLOCK_SEPARATOR: &str = "\n\n";

/// Render the `---`-fenced metadata header.
pub fn render_header(metadata: &DocumentMetadata) -> String {
    let mut fm = String::from("---\n");
    let mut field = |key: &str, value: &str| {
        fm.push_str(&format!("{key}: \"{}\"\n", escape_value(value)));
    };
    field("institution", &metadata.institution);
    field("website", &metadata.website);
    field("generated", &metadata.generated);
    field("version", &metadata.version);
    field("description", &metadata.description);
    for (key, value) in &metadata.extra {
        field(key, value);
    }
    fm.push_str("---");
    fm
}

/// Render one section at the given heading level (2 = `##`).
pub fn render_section(section: &Section, level: usize) -> String {
    let mut blocks = vec![format!("{} {}", "#".repeat(level), section.title)];

    if let Some(summary) = section.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        blocks.push(format!("> {}", single_line(summary)));
    }

    if !section.entries.is_empty() {
        let mut lines = Vec::new();
        for entry in &section.entries {
            push_entry(entry, 0, &mut lines);
        }
        blocks.push(lines.join("\n"));
    }

    for subsection in &section.subsections {
        blocks.push(render_section(subsection, level + 1));
    }

    blocks.join(BLOCK_SEPARATOR)
}

fn push_entry(entry: &Entry, indent: usize, lines: &mut Vec<String>) {
    lines.push(render_entry(entry, indent));
    for child in &entry.children {
        push_entry(child, indent + 1, lines);
    }
}

/// Render a single entry line, indented two spaces per nesting level.
pub fn render_entry(entry: &Entry, indent: usize) -> String {
    let mut line = format!(
        "{}- [{}]({})",
        "  ".repeat(indent),
        link_text(&entry.title),
        entry.url
    );
    if let Some(description) = entry.description.as_deref().filter(|d| !d.trim().is_empty()) {
        line.push_str(": ");
        line.push_str(&single_line(description));
    }
    line
}

/// Render the Topic Index, or an empty string when there are no topics.
pub fn render_topic_index(index: &TopicIndex) -> String {
    if index.is_empty() {
        return String::new();
    }

    let mut blocks = vec![format!("## {TOPIC_INDEX_HEADING}")];
    for topic in &index.topics {
        blocks.push(format!("### {}", topic.name));
        let refs: Vec<String> = topic
            .entries
            .iter()
            .map(|r| format!("- [{}]({})", link_text(&r.title), r.url))
            .collect();
        blocks.push(refs.join("\n"));
    }
    blocks.join(BLOCK_SEPARATOR)
}

/// Render all sections followed by the Topic Index.
pub fn render_body(structure: &SiteStructure) -> String {
    let mut blocks: Vec<String> = structure
        .sections
        .iter()
        .map(|s| render_section(s, 2))
        .collect();
    let index = render_topic_index(&structure.topic_index);
    if !index.is_empty() {
        blocks.push(index);
    }
    join_blocks(&blocks)
}

/// Assemble a [`StructuredDocument`] from a site structure.
pub fn build_document(
    metadata: DocumentMetadata,
    title: impl Into<String>,
    summary: impl Into<String>,
    structure: &SiteStructure,
) -> StructuredDocument {
    StructuredDocument {
        metadata,
        title: title.into(),
        summary: summary.into(),
        body: render_body(structure),
    }
}

/// Render the full document text.
pub fn render_document(doc: &StructuredDocument) -> String {
    let mut blocks = vec![render_header(&doc.metadata), format!("# {}", doc.title)];
    if !doc.summary.trim().is_empty() {
        blocks.push(format!("> {}", single_line(&doc.summary)));
    }
    if !doc.body.trim().is_empty() {
        blocks.push(doc.body.trim_end().to_string());
    }
    format!("{}\n", blocks.join(BLOCK_SEPARATOR))
}

/// Join non-empty blocks with a blank line.
pub fn join_blocks<S: AsRef<str>>(blocks: &[S]) -> String {
    blocks
        .iter()
        .map(|b| b.as_ref().trim_end())
        .filter(|b| !b.trim().is_empty())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Escape special characters in a quoted header value.
fn escape_value(s: &str) -> String {
    single_line(s).replace('\\', "\\\\").replace('"', "\\\"")
}

/// Brackets would end the link text early.
fn link_text(title: &str) -> String {
    single_line(title).replace('[', "(").replace(']', ")")
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
