//! Link extraction and link-integrity checks.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use llmstxt_shared::{LlmsTxtError, Result, SiteStructure};

/// Matches the target of a Markdown link: `](target)`.
static LINK_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(([^)\s]+)\)").expect("link target regex"));

/// Every Markdown link target in `text`, in order of first appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    LINK_TARGET_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Link targets that occur more than once in `text`, in order of first repeat.
pub fn repeated_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut repeated = Vec::new();
    for caps in LINK_TARGET_RE.captures_iter(text) {
        let url = caps[1].to_string();
        if !seen.insert(url.clone()) && !repeated.contains(&url) {
            repeated.push(url);
        }
    }
    repeated
}

/// URLs of `expected` that do not appear as link targets in `text`.
pub fn missing_urls(expected: &[String], text: &str) -> Vec<String> {
    let present: HashSet<String> = extract_urls(text).into_iter().collect();
    expected
        .iter()
        .filter(|url| !present.contains(*url))
        .cloned()
        .collect()
}

/// Check that every Topic Index reference points at an Entry in the hierarchy.
pub fn validate_topic_index(structure: &SiteStructure) -> Result<()> {
    let entries: HashSet<&str> = structure.entry_urls().into_iter().collect();
    for topic in &structure.topic_index.topics {
        for reference in &topic.entries {
            if !entries.contains(reference.url.as_str()) {
                return Err(LlmsTxtError::validation(format!(
                    "topic '{}' references {} which is not in the hierarchy",
                    topic.name, reference.url
                )));
            }
        }
    }
    Ok(())
}

/// Check that no URL appears more than once in the hierarchy.
pub fn validate_unique_entries(structure: &SiteStructure) -> Result<()> {
    let mut seen = HashSet::new();
    for url in structure.entry_urls() {
        if !seen.insert(url) {
            return Err(LlmsTxtError::validation(format!(
                "duplicate entry for {url}"
            )));
        }
    }
    Ok(())
}

/// Remove a surrounding ```` ``` ```` fence that backends like to wrap output in.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. ```markdown) along with the opening fence.
    let inner = after_open.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let inner = inner.trim_end();
    inner
        .strip_suffix("```")
        .unwrap_or(inner)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmstxt_shared::{Entry, EntryRef, Section, Topic, TopicIndex};

    fn structure(topic_url: &str) -> SiteStructure {
        SiteStructure {
            sections: vec![Section {
                slug: "home".into(),
                title: "Home".into(),
                summary: None,
                entries: vec![Entry {
                    title: "Home".into(),
                    url: "https://example.edu".into(),
                    description: None,
                    children: vec![],
                }],
                subsections: vec![],
            }],
            topic_index: TopicIndex {
                topics: vec![Topic {
                    name: "About".into(),
                    entries: vec![EntryRef {
                        title: "x".into(),
                        url: topic_url.into(),
                    }],
                }],
            },
        }
    }

    #[test]
    fn repeated_urls_reports_each_duplicate_once() {
        let text = "- [A](https://a.edu/x)\n- [B](https://a.edu/y)\n\
                    - [A again](https://a.edu/x)\n- [A third](https://a.edu/x)\n";
        assert_eq!(repeated_urls(text), vec!["https://a.edu/x"]);
        assert!(repeated_urls("- [A](https://a.edu/x)\n").is_empty());
    }

    #[test]
    fn extracts_link_targets_in_order_without_duplicates() {
        let text = "- [A](https://a.edu/x): see [B](https://a.edu/y)\n- [A again](https://a.edu/x)";
        assert_eq!(extract_urls(text), vec!["https://a.edu/x", "https://a.edu/y"]);
    }

    #[test]
    fn reports_missing_urls() {
        let expected = vec!["https://a.edu/x".to_string(), "https://a.edu/y".to_string()];
        let missing = missing_urls(&expected, "- [A](https://a.edu/x)");
        assert_eq!(missing, vec!["https://a.edu/y"]);
    }

    #[test]
    fn topic_index_must_resolve() {
        assert!(validate_topic_index(&structure("https://example.edu")).is_ok());
        assert!(validate_topic_index(&structure("https://example.edu/gone")).is_err());
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let mut s = structure("https://example.edu");
        assert!(validate_unique_entries(&s).is_ok());
        let dup = s.sections[0].entries[0].clone();
        s.sections[0].entries.push(dup);
        assert!(validate_unique_entries(&s).is_err());
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```markdown\n## A\n- x\n```"), "## A\n- x");
        assert_eq!(strip_code_fences("```\n## A\n```\n"), "## A");
        assert_eq!(strip_code_fences("  ## A  "), "## A");
    }
}
