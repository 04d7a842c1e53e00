//! Structured Document parser.
//!
//! Inverts [`crate::render`]. Parsing is lenient: prose lines the renderer
//! never emits are skipped, and unknown header keys are kept in
//! [`DocumentMetadata::extra`].

use std::sync::LazyLock;

use regex::Regex;

use llmstxt_shared::{
    DocumentMetadata, Entry, EntryRef, LlmsTxtError, Result, Section, SiteStructure, Topic,
    TopicIndex,
};

use crate::render::TOPIC_INDEX_HEADING;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A parsed Structured Document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Header fields, if the document has a `---` header.
    pub metadata: Option<DocumentMetadata>,
    /// The H1 title (falls back to the header's institution).
    pub title: String,
    /// The blockquote summary under the title.
    pub summary: Option<String>,
    /// Sections and Topic Index.
    pub structure: SiteStructure,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `#`..`######` headings.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading regex"));

/// Matches `> Blockquote text`.
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s*(.*)$").expect("blockquote regex"));

/// Matches `- [Name](url)` or `- [Name](url): Notes`, capturing indentation.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( *)[-*]\s+\[([^\]]+)\]\(([^)\s]+)\)(?::\s*(.*))?$").expect("link regex")
});

/// Matches `key: "value"` or `key: value` header lines.
static HEADER_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_-]+):\s*(.*)$").expect("header field regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

enum Mode {
    Preamble,
    Sections,
    Topics,
}

/// Parse a Structured Document.
pub fn parse_document(content: &str) -> Result<ParsedDocument> {
    if content.trim().is_empty() {
        return Err(LlmsTxtError::parse("document is empty"));
    }

    let (metadata, body) = split_header(content);

    let mut title: Option<String> = None;
    let mut summary_parts: Vec<String> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    let mut topics: Vec<Topic> = Vec::new();

    let mut mode = Mode::Preamble;
    let mut section_path: Vec<usize> = Vec::new();
    let mut entry_path: Vec<usize> = Vec::new();
    let mut seen_entries = false;

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(trimmed) {
            let level = caps[1].len();
            let text = caps[2].trim().to_string();

            if level == 1 {
                if title.is_none() {
                    title = Some(text);
                }
                continue;
            }

            if level == 2 && text == TOPIC_INDEX_HEADING {
                mode = Mode::Topics;
                continue;
            }

            if let Mode::Topics = mode {
                if level == 3 {
                    topics.push(Topic {
                        name: text,
                        entries: Vec::new(),
                    });
                    continue;
                }
                // A new `##` heading after the index resumes the hierarchy.
                if level > 3 {
                    continue;
                }
            }

            mode = Mode::Sections;
            let depth = (level - 2).min(section_path.len());
            section_path.truncate(depth);
            let new_section = Section {
                slug: slugify(&text),
                title: text,
                summary: None,
                entries: Vec::new(),
                subsections: Vec::new(),
            };
            let siblings = if section_path.is_empty() {
                &mut sections
            } else {
                let Some(parent) = section_at(&mut sections, &section_path) else {
                    continue;
                };
                &mut parent.subsections
            };
            siblings.push(new_section);
            section_path.push(siblings.len() - 1);
            entry_path.clear();
            seen_entries = false;
            continue;
        }

        if let Some(caps) = BLOCKQUOTE_RE.captures(trimmed) {
            let text = caps[1].trim();
            match mode {
                Mode::Preamble => summary_parts.push(text.to_string()),
                Mode::Sections if !seen_entries => {
                    if let Some(section) = section_at(&mut sections, &section_path) {
                        let summary = section.summary.get_or_insert_with(String::new);
                        if !summary.is_empty() {
                            summary.push(' ');
                        }
                        summary.push_str(text);
                    }
                }
                _ => {}
            }
            continue;
        }

        if let Some(caps) = LINK_RE.captures(line.trim_end()) {
            let indent = caps[1].len() / 2;
            let title = caps[2].trim().to_string();
            let url = caps[3].trim().to_string();
            let description = caps
                .get(4)
                .map(|m| m.as_str().trim().to_string())
                .filter(|d| !d.is_empty());

            match mode {
                Mode::Topics => {
                    if let Some(topic) = topics.last_mut() {
                        topic.entries.push(EntryRef { title, url });
                    }
                }
                Mode::Sections => {
                    let Some(section) = section_at(&mut sections, &section_path) else {
                        continue;
                    };
                    let level = indent.min(entry_path.len());
                    entry_path.truncate(level);
                    let Some(siblings) = entries_at(&mut section.entries, &entry_path) else {
                        continue;
                    };
                    siblings.push(Entry {
                        title,
                        url,
                        description,
                        children: Vec::new(),
                    });
                    entry_path.push(siblings.len() - 1);
                    seen_entries = true;
                }
                Mode::Preamble => {}
            }
        }

        // Other lines (descriptive prose) are skipped.
    }

    let title = match (title, &metadata) {
        (Some(t), _) => t,
        (None, Some(meta)) if !meta.institution.is_empty() => meta.institution.clone(),
        (None, _) if metadata.is_none() && sections.is_empty() => {
            return Err(LlmsTxtError::parse(
                "document has no header, title, or sections",
            ));
        }
        (None, _) => String::new(),
    };

    Ok(ParsedDocument {
        metadata,
        title,
        summary: (!summary_parts.is_empty()).then(|| summary_parts.join(" ")),
        structure: SiteStructure {
            sections,
            topic_index: TopicIndex { topics },
        },
    })
}

/// Split a leading `---` header from the rest of the document.
fn split_header(content: &str) -> (Option<DocumentMetadata>, &str) {
    let trimmed = content.trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        return (None, content);
    };
    let Some(after_open) = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))
    else {
        return (None, content);
    };

    let mut header_len = 0;
    let mut closed = false;
    for line in after_open.split_inclusive('\n') {
        if line.trim() == "---" {
            closed = true;
            break;
        }
        header_len += line.len();
    }
    if !closed {
        return (None, content);
    }

    let header = &after_open[..header_len];
    let rest = after_open[header_len..]
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or("");

    let mut metadata = DocumentMetadata {
        institution: String::new(),
        website: String::new(),
        generated: String::new(),
        version: String::new(),
        description: String::new(),
        extra: Vec::new(),
    };
    for line in header.lines() {
        let Some(caps) = HEADER_FIELD_RE.captures(line.trim()) else {
            continue;
        };
        let value = unquote(caps[2].trim());
        match &caps[1] {
            "institution" => metadata.institution = value,
            "website" => metadata.website = value,
            "generated" => metadata.generated = value,
            "version" => metadata.version = value,
            "description" => metadata.description = value,
            other => metadata.extra.push((other.to_string(), value)),
        }
    }

    (Some(metadata), rest)
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

fn section_at<'a>(sections: &'a mut [Section], path: &[usize]) -> Option<&'a mut Section> {
    let (first, rest) = path.split_first()?;
    let mut current = sections.get_mut(*first)?;
    for idx in rest {
        current = current.subsections.get_mut(*idx)?;
    }
    Some(current)
}

fn entries_at<'a>(entries: &'a mut Vec<Entry>, path: &[usize]) -> Option<&'a mut Vec<Entry>> {
    let mut current = entries;
    for idx in path {
        current = &mut current.get_mut(*idx)?.children;
    }
    Some(current)
}

/// Lowercase, hyphen-separated form of a heading.
pub fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
