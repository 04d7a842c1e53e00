//! Query Set Provider: load, synthesize, or default the test questions.

use std::path::Path;

use tracing::{info, warn};

use llmstxt_backends::{BackendError, GenerateRequest, GenerativeBackend};
use llmstxt_shared::{LlmsTxtError, Result};

use crate::assistant::extract_json;
use crate::types::Query;

/// Number of queries requested when synthesizing from the document.
pub const AUTO_QUERY_COUNT: usize = 8;

/// Load a query set from a JSON file: an array of `{query, category?, key_facts?}`.
///
/// A missing or malformed file is a configuration error.
pub fn load_queries(path: &Path) -> Result<Vec<Query>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LlmsTxtError::config(format!("cannot read query set {}: {e}", path.display()))
    })?;
    let queries: Vec<Query> = serde_json::from_str(&content).map_err(|e| {
        LlmsTxtError::config(format!("invalid query set {}: {e}", path.display()))
    })?;
    if let Some(i) = queries.iter().position(|q| q.query.trim().is_empty()) {
        return Err(LlmsTxtError::config(format!(
            "invalid query set {}: query {} has no text",
            path.display(),
            i + 1
        )));
    }
    if queries.is_empty() {
        return Err(LlmsTxtError::config(format!(
            "query set {} is empty",
            path.display()
        )));
    }
    info!(count = queries.len(), path = %path.display(), "loaded query set");
    Ok(queries)
}

/// Ask `backend` for test queries grounded in `document`.
pub async fn generate_queries(
    backend: &dyn GenerativeBackend,
    document: &str,
) -> std::result::Result<Vec<Query>, BackendError> {
    let prompt = format!(
        "Below is a structured site map of a website. Generate {AUTO_QUERY_COUNT} realistic test queries \
that a prospective student, employer, or researcher might ask an AI assistant about this organization.

For each query, also list 3-5 key facts from the site map that a good answer should include.

Return ONLY valid JSON — an array of objects with keys: \"query\", \"category\", \"key_facts\" (array of strings).

Site map:
---
{document}
---"
    );
    let request = GenerateRequest::new(prompt)
        .with_system("You are a helpful assistant that returns only valid JSON.")
        .with_max_tokens(2048);

    let generation = backend.generate(&request).await?;
    let queries: Vec<Query> = serde_json::from_str(extract_json(&generation.text, '[', ']'))
        .map_err(|e| BackendError::malformed(format!("query generation returned invalid JSON: {e}")))?;
    let queries: Vec<Query> = queries
        .into_iter()
        .filter(|q| !q.query.trim().is_empty())
        .collect();
    if queries.is_empty() {
        return Err(BackendError::malformed("query generation returned no queries"));
    }
    Ok(queries)
}

/// [`generate_queries`], falling back to [`default_queries`] on any failure.
pub async fn generate_or_default(
    backend: &dyn GenerativeBackend,
    document: &str,
    site_name: &str,
) -> Vec<Query> {
    match generate_queries(backend, document).await {
        Ok(queries) => {
            info!(count = queries.len(), "generated test queries");
            queries
        }
        Err(e) => {
            warn!(error = %e, "query generation failed, using default queries");
            default_queries(site_name)
        }
    }
}

/// Built-in generic queries about `site_name`.
pub fn default_queries(site_name: &str) -> Vec<Query> {
    vec![
        Query::new(
            format!("What degree programs does {site_name} offer, and where can I compare them?"),
            "prospective_student",
            &["list of programs", "program pages", "degree levels offered"],
        ),
        Query::new(
            format!("How do I apply to {site_name}, and what are the admission requirements?"),
            "prospective_student",
            &["admissions page", "application steps", "deadlines or requirements"],
        ),
        Query::new(
            format!("Does {site_name} offer online or part-time options?"),
            "prospective_student",
            &["online programs", "flexible formats", "program links"],
        ),
        Query::new(
            format!("What research centers or institutes are part of {site_name}?"),
            "research",
            &["named research centers", "research areas", "links to center pages"],
        ),
        Query::new(
            format!("What career support does {site_name} provide to its students?"),
            "career",
            &["career services office", "recruiting or internships", "coaching resources"],
        ),
        Query::new(
            format!("I'm a company looking to recruit from {site_name}. How do I partner with them?"),
            "corporate",
            &["corporate partnership page", "recruiting events", "contact information"],
        ),
        Query::new(
            format!("Where can I find news and upcoming events at {site_name}?"),
            "general",
            &["news page", "events calendar"],
        ),
        Query::new(
            format!("How do I contact {site_name} or find a specific faculty or staff member?"),
            "general",
            &["contact page", "directory", "office locations"],
        ),
    ]
}

/// Keep at most `max` queries, in input order.
pub fn limit_queries(mut queries: Vec<Query>, max: Option<usize>) -> Vec<Query> {
    if let Some(max) = max {
        queries.truncate(max);
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use llmstxt_backends::Generation;

    struct Canned(Mutex<Option<std::result::Result<String, BackendError>>>);

    #[async_trait::async_trait]
    impl GenerativeBackend for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn label(&self) -> String {
            "Canned".into()
        }

        async fn generate(
            &self,
            _: &GenerateRequest,
        ) -> std::result::Result<Generation, BackendError> {
            let next = self.0.lock().unwrap().take().unwrap_or(Err(BackendError::Timeout));
            next.map(|text| Generation {
                text,
                model: "canned".into(),
            })
        }
    }

    fn temp_file(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("llmstxt-queries-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_query_file_with_defaults() {
        let path = temp_file(
            r#"[{"query": "What is the MBA?", "key_facts": ["iMBA"]},
                {"query": "Where is campus?", "category": "general"}]"#,
        );
        let queries = load_queries(&path).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].category, "general");
        assert_eq!(queries[0].key_facts, vec!["iMBA"]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_query_file_is_config_error() {
        let path = temp_file(r#"{"query": "not an array"}"#);
        assert!(matches!(load_queries(&path), Err(LlmsTxtError::Config { .. })));
        std::fs::remove_file(&path).ok();

        let missing = std::env::temp_dir().join("llmstxt-no-such-queries.json");
        assert!(matches!(load_queries(&missing), Err(LlmsTxtError::Config { .. })));
    }

    #[tokio::test]
    async fn generated_queries_are_extracted_from_fenced_json() {
        let backend = Canned(Mutex::new(Some(Ok(
            "```json\n[{\"query\": \"Q1\", \"category\": \"career\", \"key_facts\": [\"a\"]}]\n```".into(),
        ))));
        let queries = generate_queries(&backend, "# Example").await.unwrap();
        assert_eq!(queries, vec![Query::new("Q1", "career", &["a"])]);
    }

    #[tokio::test]
    async fn generation_failure_falls_back_to_defaults() {
        let backend = Canned(Mutex::new(Some(Ok("I cannot do that.".into()))));
        let queries = generate_or_default(&backend, "# Example", "Example").await;
        assert_eq!(queries, default_queries("Example"));
        assert!(queries[0].query.contains("Example"));
    }

    #[test]
    fn limit_keeps_input_order() {
        let queries = limit_queries(default_queries("X"), Some(2));
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1], default_queries("X")[1]);
        assert_eq!(limit_queries(default_queries("X"), None).len(), AUTO_QUERY_COUNT);
    }
}
