//! Structurer: classify crawled pages into a section hierarchy.
//!
//! Pages are grouped by URL path segments into sections and subsections,
//! each page becomes exactly one [`Entry`], and a Topic Index is derived
//! from configured keywords.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use regex::Regex;
use tracing::{debug, instrument, warn};

use llmstxt_shared::{Entry, EntryRef, Page, Section, SiteStructure, Topic, TopicIndex, TopicRule};

/// Slug of the section holding root-level pages.
pub const HOME_SLUG: &str = "home";

/// Longest description seed taken from page text.
const MAX_SEED_CHARS: usize = 160;

/// Inputs that shape the hierarchy.
#[derive(Debug, Clone)]
pub struct StructureOptions {
    /// Used as the title of the root page when it has none.
    pub site_name: String,
    /// Maximum section nesting (1 = top-level sections only).
    pub max_depth: usize,
    /// Topic keywords, in Topic Index order.
    pub topics: Vec<TopicRule>,
}

/// Build the site structure from crawled pages.
///
/// Failed pages produce no entry; a URL seen twice keeps its first page.
#[instrument(skip_all, fields(page_count = pages.len(), max_depth = options.max_depth))]
pub fn structure(pages: &[Page], options: &StructureOptions) -> SiteStructure {
    let max_depth = options.max_depth.max(1);

    let mut seen: HashSet<&str> = HashSet::new();
    let kept: Vec<&Page> = pages
        .iter()
        .filter(|p| p.is_ok())
        .filter(|p| seen.insert(p.url.as_str()))
        .collect();

    // A page's group is its parent path, capped at max_depth; a page whose own
    // path names a group becomes that group's landing entry.
    let parent_groups: Vec<Vec<String>> = kept
        .iter()
        .map(|p| parent_group(&p.path_segments, max_depth))
        .collect();
    let known: BTreeSet<&[String]> = parent_groups.iter().map(Vec::as_slice).collect();

    let mut groups: BTreeMap<Vec<String>, Vec<(String, Entry)>> = BTreeMap::new();
    for (page, parent) in kept.iter().zip(&parent_groups) {
        let segments = &page.path_segments;
        let group = if !segments.is_empty()
            && segments.len() <= max_depth
            && known.contains(segments.as_slice())
        {
            segments.clone()
        } else {
            parent.clone()
        };
        groups
            .entry(group)
            .or_default()
            .push((page.path(), page_entry(page, &options.site_name)));
    }

    let mut sections = Vec::new();
    if let Some(home) = groups.get(&Vec::new()) {
        sections.push(Section {
            slug: HOME_SLUG.into(),
            title: "Home".into(),
            summary: None,
            entries: sorted_entries(home),
            subsections: Vec::new(),
        });
    }

    let top_level: BTreeSet<&String> = groups.keys().filter_map(|k| k.first()).collect();
    for slug in top_level {
        let section = build_section(std::slice::from_ref(slug), &groups);
        if slug == HOME_SLUG {
            // A literal `/home` path merges into the root section.
            if let Some(home) = sections.first_mut() {
                merge_into(home, section);
                continue;
            }
        }
        sections.push(section);
    }

    let mut structure = SiteStructure {
        sections,
        topic_index: TopicIndex::default(),
    };
    structure.topic_index = build_topic_index(&structure, &options.topics);

    debug!(
        sections = structure.sections.len(),
        entries = structure.entry_count(),
        topics = structure.topic_index.topics.len(),
        "site structure built"
    );

    structure
}

fn parent_group(segments: &[String], max_depth: usize) -> Vec<String> {
    if segments.is_empty() {
        return Vec::new();
    }
    let len = (segments.len() - 1).clamp(1, max_depth);
    segments[..len].to_vec()
}

fn build_section(prefix: &[String], groups: &BTreeMap<Vec<String>, Vec<(String, Entry)>>) -> Section {
    let entries = groups
        .get(prefix)
        .map(|e| sorted_entries(e))
        .unwrap_or_default();

    let children: BTreeSet<&String> = groups
        .keys()
        .filter(|k| k.len() > prefix.len() && k.starts_with(prefix))
        .map(|k| &k[prefix.len()])
        .collect();

    let subsections = children
        .into_iter()
        .map(|segment| {
            let mut child = prefix.to_vec();
            child.push(segment.clone());
            build_section(&child, groups)
        })
        .collect();

    let slug = prefix.last().cloned().unwrap_or_default();
    Section {
        title: section_label(&slug),
        slug,
        summary: None,
        entries,
        subsections,
    }
}

fn merge_into(target: &mut Section, other: Section) {
    target.entries.extend(other.entries);
    target.subsections.extend(other.subsections);
}

/// Entries ordered by (path, title).
fn sorted_entries(entries: &[(String, Entry)]) -> Vec<Entry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.title.cmp(&b.1.title)));
    sorted.into_iter().map(|(_, entry)| entry).collect()
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

fn page_entry(page: &Page, site_name: &str) -> Entry {
    let title = page_title(page, site_name);
    let description = description_seed(page, &title);
    Entry {
        title,
        url: page.url.clone(),
        description: Some(description),
        children: Vec::new(),
    }
}

/// `<title>`, then `<h1>`, then the prettified last path segment, then the site name.
fn page_title(page: &Page, site_name: &str) -> String {
    [page.title.as_deref(), page.heading.as_deref()]
        .into_iter()
        .flatten()
        .map(collapse)
        .find(|t| !t.is_empty())
        .or_else(|| page.path_segments.last().map(|s| section_label(s)))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| site_name.to_string())
}

fn description_seed(page: &Page, title: &str) -> String {
    [page.meta_description.as_deref(), Some(page.text.as_str())]
        .into_iter()
        .flatten()
        .map(|s| first_sentence(&collapse(s)))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{title} page."))
}

/// First sentence of `text`, at most [`MAX_SEED_CHARS`] characters, cut at a word boundary.
fn first_sentence(text: &str) -> String {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && text[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(text.len());
    let sentence = &text[..end];

    if sentence.chars().count() <= MAX_SEED_CHARS {
        return sentence.to_string();
    }

    let mut cut = String::new();
    for word in sentence.split_whitespace() {
        let extra = if cut.is_empty() { word.len() } else { word.len() + 1 };
        if cut.chars().count() + extra > MAX_SEED_CHARS - 3 {
            break;
        }
        if !cut.is_empty() {
            cut.push(' ');
        }
        cut.push_str(word);
    }
    if cut.is_empty() {
        cut = sentence.chars().take(MAX_SEED_CHARS - 3).collect();
    }
    format!("{}...", cut.trim_end_matches([',', ';', ':']))
}

/// `"undergraduate-hub"` → `"Undergraduate Hub"`.
pub fn section_label(slug: &str) -> String {
    slug.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Topic Index
// ---------------------------------------------------------------------------

/// Match entry titles and descriptions against topic keywords.
///
/// Topics keep their configured order, references follow hierarchy order,
/// and topics without matches are left out.
pub fn build_topic_index(structure: &SiteStructure, rules: &[TopicRule]) -> TopicIndex {
    let entries = entries_in_order(&structure.sections);

    let topics = rules
        .iter()
        .filter_map(|rule| {
            let matcher = keyword_matcher(&rule.keywords)?;
            let refs: Vec<EntryRef> = entries
                .iter()
                .filter(|entry| {
                    matcher.is_match(&entry.title)
                        || entry
                            .description
                            .as_deref()
                            .is_some_and(|d| matcher.is_match(d))
                })
                .map(|entry| EntryRef {
                    title: entry.title.clone(),
                    url: entry.url.clone(),
                })
                .collect();
            (!refs.is_empty()).then(|| Topic {
                name: rule.name.clone(),
                entries: refs,
            })
        })
        .collect();

    TopicIndex { topics }
}

/// Case-insensitive whole-word regex over all keywords.
fn keyword_matcher(keywords: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "invalid topic keywords, skipping topic");
            None
        }
    }
}

fn entries_in_order(sections: &[Section]) -> Vec<&Entry> {
    fn walk_entries<'a>(entries: &'a [Entry], out: &mut Vec<&'a Entry>) {
        for entry in entries {
            out.push(entry);
            walk_entries(&entry.children, out);
        }
    }
    fn walk_sections<'a>(sections: &'a [Section], out: &mut Vec<&'a Entry>) {
        for section in sections {
            walk_entries(&section.entries, out);
            walk_sections(&section.subsections, out);
        }
    }

    let mut out = Vec::new();
    walk_sections(sections, &mut out);
    out
}
