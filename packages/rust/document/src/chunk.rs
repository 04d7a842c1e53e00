//! Splitting a site structure into backend-sized chunks.

use llmstxt_shared::SiteStructure;

use crate::links::extract_urls;
use crate::render::{render_section, render_topic_index};

/// What a chunk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// A top-level section, or one part of an oversized section.
    Section,
    /// The Topic Index.
    TopicIndex,
}

/// A rendered slice of the document sent to the backend as one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    /// Human-readable label for logs and reports.
    pub label: String,
    /// Rendered text.
    pub text: String,
}

impl Chunk {
    /// Link targets in this chunk, in order.
    pub fn urls(&self) -> Vec<String> {
        extract_urls(&self.text)
    }
}

/// One chunk per top-level section; sections longer than `max_chars` are
/// split at line boundaries into consecutive parts.
pub fn section_chunks(structure: &SiteStructure, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for section in &structure.sections {
        let text = render_section(section, 2);
        let parts = split_at_lines(&text, max_chars);
        let total = parts.len();
        for (i, part) in parts.into_iter().enumerate() {
            let label = if total == 1 {
                section.title.clone()
            } else {
                format!("{} (part {}/{total})", section.title, i + 1)
            };
            chunks.push(Chunk {
                kind: ChunkKind::Section,
                label,
                text: part,
            });
        }
    }
    chunks
}

/// The Topic Index as a chunk, or `None` when it is empty.
pub fn topic_index_chunk(structure: &SiteStructure) -> Option<Chunk> {
    let text = render_topic_index(&structure.topic_index);
    (!text.is_empty()).then(|| Chunk {
        kind: ChunkKind::TopicIndex,
        label: "Topic Index".into(),
        text,
    })
}

/// Split text into pieces of at most `max_chars` characters, breaking only
/// between lines. A single line longer than the limit becomes its own piece.
fn split_at_lines(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if !current.is_empty() && current_len + needed > max_chars {
            parts.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.trim().is_empty() {
        parts.push(current.trim_end().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmstxt_shared::{Entry, EntryRef, Section, Topic, TopicIndex};

    fn section(slug: &str, n: usize) -> Section {
        Section {
            slug: slug.into(),
            title: slug.to_uppercase(),
            summary: None,
            entries: (0..n)
                .map(|i| Entry {
                    title: format!("Page {i}"),
                    url: format!("https://example.edu/{slug}/{i}"),
                    description: Some("A page.".into()),
                    children: vec![],
                })
                .collect(),
            subsections: vec![],
        }
    }

    #[test]
    fn one_chunk_per_section() {
        let structure = SiteStructure {
            sections: vec![section("home", 1), section("programs", 3)],
            topic_index: TopicIndex::default(),
        };
        let chunks = section_chunks(&structure, 10_000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].label, "PROGRAMS");
        assert_eq!(chunks[1].urls().len(), 3);
        assert!(topic_index_chunk(&structure).is_none());
    }

    #[test]
    fn oversized_section_splits_without_losing_urls() {
        let structure = SiteStructure {
            sections: vec![section("news", 40)],
            topic_index: TopicIndex::default(),
        };
        let chunks = section_chunks(&structure, 300);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 300));
        assert_eq!(chunks[0].label, format!("NEWS (part 1/{})", chunks.len()));

        let all: Vec<String> = chunks.iter().flat_map(|c| c.urls()).collect();
        assert_eq!(all.len(), 40);
    }

    #[test]
    fn topic_index_chunk_renders_index() {
        let structure = SiteStructure {
            sections: vec![section("home", 1)],
            topic_index: TopicIndex {
                topics: vec![Topic {
                    name: "About".into(),
                    entries: vec![EntryRef {
                        title: "Page 0".into(),
                        url: "https://example.edu/home/0".into(),
                    }],
                }],
            },
        };
        let chunk = topic_index_chunk(&structure).unwrap();
        assert_eq!(chunk.kind, ChunkKind::TopicIndex);
        assert!(chunk.text.starts_with("## Topic Index"));
    }
}
