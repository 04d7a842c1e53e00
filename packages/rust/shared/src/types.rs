//! Core domain types shared by the generator and the benchmark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version string stamped into every Structured Document header.
pub const CURRENT_DOCUMENT_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for benchmark run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Outcome of the single fetch attempt made for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    /// The page was fetched and parsed.
    Ok {
        /// HTTP status code returned by the server.
        http_status: u16,
    },
    /// The fetch failed; the crawl carried on without it.
    Failed {
        /// Human-readable failure reason.
        error: String,
    },
}

/// A single visited page, keyed by its normalized URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Normalized URL (scheme + host + path, no fragment or trailing slash).
    pub url: String,
    /// Non-empty path segments of the URL, in order.
    pub path_segments: Vec<String>,
    /// BFS depth at which the page was discovered (root = 0).
    pub depth: u32,
    /// Result of the fetch.
    pub status: FetchStatus,
    /// `<title>` text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// First `<h1>` text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// `<meta name="description">` content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    /// Visible body text with whitespace collapsed.
    #[serde(default)]
    pub text: String,
    /// Normalized outbound links, in document order, deduplicated.
    #[serde(default)]
    pub links: Vec<String>,
    /// SHA-256 of `text` (absent for failed fetches).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// When the fetch attempt finished.
    pub fetched_at: DateTime<Utc>,
}

impl Page {
    /// Whether the fetch succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, FetchStatus::Ok { .. })
    }

    /// The URL path in `/a/b` form (empty string for the root).
    pub fn path(&self) -> String {
        if self.path_segments.is_empty() {
            String::new()
        } else {
            format!("/{}", self.path_segments.join("/"))
        }
    }
}

// ---------------------------------------------------------------------------
// Site structure
// ---------------------------------------------------------------------------

/// A linked page inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Display title.
    pub title: String,
    /// Source URL, preserved verbatim through every stage.
    pub url: String,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested entries rendered as an indented list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Entry>,
}

/// A path-segment group of entries, possibly with nested subsections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Path segment this section groups (`home` for the root).
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Optional short summary shown as a blockquote under the heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Entries directly in this section.
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Nested subsections.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<Section>,
}

/// A reference from the Topic Index to an entry in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRef {
    pub title: String,
    pub url: String,
}

/// A single topic and the entries filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub entries: Vec<EntryRef>,
}

/// Cross-reference from subject keywords to entries across the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicIndex {
    pub topics: Vec<Topic>,
}

impl TopicIndex {
    /// Whether the index has no topics.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// The hierarchical site map produced by the structurer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStructure {
    /// Top-level sections, `Home` first.
    pub sections: Vec<Section>,
    /// Derived topic cross-reference.
    #[serde(default)]
    pub topic_index: TopicIndex,
}

impl SiteStructure {
    /// Every entry URL in hierarchy order (sections, then subsections, depth-first).
    pub fn entry_urls(&self) -> Vec<&str> {
        fn walk_entries<'a>(entries: &'a [Entry], out: &mut Vec<&'a str>) {
            for entry in entries {
                out.push(entry.url.as_str());
                walk_entries(&entry.children, out);
            }
        }
        fn walk_sections<'a>(sections: &'a [Section], out: &mut Vec<&'a str>) {
            for section in sections {
                walk_entries(&section.entries, out);
                walk_sections(&section.subsections, out);
            }
        }

        let mut out = Vec::new();
        walk_sections(&self.sections, &mut out);
        out
    }

    /// Total number of entries in the hierarchy.
    pub fn entry_count(&self) -> usize {
        self.entry_urls().len()
    }
}

// ---------------------------------------------------------------------------
// Structured document
// ---------------------------------------------------------------------------

/// Key-value header at the top of a Structured Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Institution or site name.
    pub institution: String,
    /// Source website URL.
    pub website: String,
    /// Generation timestamp (RFC 3339).
    pub generated: String,
    /// Document format version.
    pub version: String,
    /// One-line description of the document.
    pub description: String,
    /// Header keys not covered above, in file order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

/// The final artifact: header, title, summary, and rendered body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub metadata: DocumentMetadata,
    /// Top-level `# title`.
    pub title: String,
    /// Blockquote summary under the title.
    pub summary: String,
    /// Sections followed by the Topic Index, already rendered.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> Entry {
        Entry {
            title: url.into(),
            url: url.into(),
            description: None,
            children: vec![],
        }
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn fetch_status_serialization() {
        let json = serde_json::to_string(&FetchStatus::Failed {
            error: "HTTP 404".into(),
        })
        .unwrap();
        assert!(json.contains(r#""status":"failed""#));

        let parsed: FetchStatus = serde_json::from_str(r#"{"status":"ok","http_status":200}"#)
            .expect("deserialize");
        assert_eq!(parsed, FetchStatus::Ok { http_status: 200 });
    }

    #[test]
    fn page_path_from_segments() {
        let mut page = Page {
            url: "https://example.edu".into(),
            path_segments: vec![],
            depth: 0,
            status: FetchStatus::Ok { http_status: 200 },
            title: None,
            heading: None,
            meta_description: None,
            text: String::new(),
            links: vec![],
            content_hash: None,
            fetched_at: Utc::now(),
        };
        assert_eq!(page.path(), "");
        assert!(page.is_ok());

        page.path_segments = vec!["programs".into(), "mba".into()];
        assert_eq!(page.path(), "/programs/mba");
    }

    #[test]
    fn entry_urls_walks_hierarchy_in_order() {
        let structure = SiteStructure {
            sections: vec![
                Section {
                    slug: "home".into(),
                    title: "Home".into(),
                    summary: None,
                    entries: vec![entry("https://a.edu")],
                    subsections: vec![],
                },
                Section {
                    slug: "programs".into(),
                    title: "Programs".into(),
                    summary: None,
                    entries: vec![Entry {
                        children: vec![entry("https://a.edu/programs/x")],
                        ..entry("https://a.edu/programs")
                    }],
                    subsections: vec![Section {
                        slug: "mba".into(),
                        title: "Mba".into(),
                        summary: None,
                        entries: vec![entry("https://a.edu/programs/mba/online")],
                        subsections: vec![],
                    }],
                },
            ],
            topic_index: TopicIndex::default(),
        };

        assert_eq!(
            structure.entry_urls(),
            vec![
                "https://a.edu",
                "https://a.edu/programs",
                "https://a.edu/programs/x",
                "https://a.edu/programs/mba/online",
            ]
        );
        assert_eq!(structure.entry_count(), 4);
    }
}
