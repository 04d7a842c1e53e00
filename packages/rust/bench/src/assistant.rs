//! The answer/judge capability the harness runs against.

use std::sync::Arc;

use tracing::debug;

use llmstxt_backends::{BackendError, GenerateRequest, GenerativeBackend};

use crate::types::{JudgeVerdict, Query};

/// Answers questions and judges answer pairs.
#[async_trait::async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Display label for reports.
    fn label(&self) -> String;

    /// Answer `question`, with `context` supplied as reference material when given.
    async fn generate_answer(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<String, BackendError>;

    /// Score both answers to `query` against its key facts.
    async fn judge(
        &self,
        query: &Query,
        baseline: &str,
        enhanced: &str,
    ) -> Result<JudgeVerdict, BackendError>;
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const BASELINE_SYSTEM: &str = "You are a helpful AI assistant answering questions about \
organizations and their websites. Answer based on your general knowledge. If you're unsure \
about specific details, say so.";

const CONTEXT_SYSTEM_PREFIX: &str = "You are a helpful AI assistant answering questions about \
organizations and their websites. You have been provided with the following structured \
reference about the organization. Use it to give accurate, specific, and actionable answers.";

const JUDGE_SYSTEM: &str =
    "You are a rigorous, impartial evaluator. Return only valid JSON. Be strict in scoring.";

const ANSWER_MAX_TOKENS: u32 = 1024;
const JUDGE_MAX_TOKENS: u32 = 1024;

fn context_system(context: &str) -> String {
    format!("{CONTEXT_SYSTEM_PREFIX}\n\n--- REFERENCE ---\n{context}\n--- END REFERENCE ---")
}

fn judge_prompt(query: &Query, baseline: &str, enhanced: &str) -> String {
    let key_facts = if query.key_facts.is_empty() {
        "- (none listed; judge on general quality)".to_string()
    } else {
        query
            .key_facts
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are an expert evaluator assessing AI assistant responses about an organization.

A user asked: "{question}"

Here are the key facts that a good answer should include:
{key_facts}

---

**Response A (Baseline — no structured context provided):**
{baseline}

---

**Response B (Enhanced — structured site map provided as context):**
{enhanced}

---

Score EACH response on a scale of 0-10 for each criterion:
1. **Accuracy** — Are the stated facts correct? No hallucinations?
2. **Completeness** — How many of the key facts are covered?
3. **Specificity** — Does it give concrete details (program names, URLs, features) vs. vague generalities?
4. **Actionability** — Does it help the user take a next step (links, contact info, clear recommendations)?

Return ONLY valid JSON with this exact structure:
{{
  "baseline": {{"accuracy": N, "completeness": N, "specificity": N, "actionability": N, "notes": "brief explanation"}},
  "enhanced": {{"accuracy": N, "completeness": N, "specificity": N, "actionability": N, "notes": "brief explanation"}}
}}"#,
        question = query.query,
    )
}

// ---------------------------------------------------------------------------
// LlmAssistant
// ---------------------------------------------------------------------------

/// [`AssistantBackend`] over any generative backend.
pub struct LlmAssistant {
    backend: Arc<dyn GenerativeBackend>,
}

impl LlmAssistant {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn GenerativeBackend {
        self.backend.as_ref()
    }
}

#[async_trait::async_trait]
impl AssistantBackend for LlmAssistant {
    fn label(&self) -> String {
        self.backend.label()
    }

    async fn generate_answer(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<String, BackendError> {
        let system = match context {
            Some(context) => context_system(context),
            None => BASELINE_SYSTEM.to_string(),
        };
        let request = GenerateRequest::new(question)
            .with_system(system)
            .with_max_tokens(ANSWER_MAX_TOKENS);
        let generation = self.backend.generate(&request).await?;
        debug!(with_context = context.is_some(), chars = generation.text.len(), "answer received");
        Ok(generation.text)
    }

    async fn judge(
        &self,
        query: &Query,
        baseline: &str,
        enhanced: &str,
    ) -> Result<JudgeVerdict, BackendError> {
        let request = GenerateRequest::new(judge_prompt(query, baseline, enhanced))
            .with_system(JUDGE_SYSTEM)
            .with_max_tokens(JUDGE_MAX_TOKENS);
        let generation = self.backend.generate(&request).await?;
        parse_verdict(&generation.text)
    }
}

// ---------------------------------------------------------------------------
// Judge output
// ---------------------------------------------------------------------------

/// Parse and range-check the judge's JSON.
pub fn parse_verdict(raw: &str) -> Result<JudgeVerdict, BackendError> {
    let json = extract_json(raw, '{', '}');
    let verdict: JudgeVerdict = serde_json::from_str(json)
        .map_err(|e| BackendError::malformed(format!("judge returned invalid JSON: {e}")))?;

    for (answer, score) in [("baseline", &verdict.baseline), ("enhanced", &verdict.enhanced)] {
        if let Some((dimension, value)) = score.out_of_range() {
            return Err(BackendError::malformed(format!(
                "judge scored {answer} {} as {value}, outside 0-10",
                dimension.as_str()
            )));
        }
    }
    Ok(verdict)
}

/// The JSON payload inside backend output: the contents of a ```` ```json ````
/// fence if present, narrowed to the outermost `open`..`close` pair.
pub(crate) fn extract_json(raw: &str, open: char, close: char) -> &str {
    let mut text = raw.trim();
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            text = after[..end].trim();
        }
    }
    match (text.find(open), text.rfind(close)) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use llmstxt_backends::OpenAiBackend;
    use llmstxt_shared::ApiKey;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VERDICT: &str = r#"{
        "baseline": {"accuracy": 4, "completeness": 3, "specificity": 2, "actionability": 1, "notes": "vague"},
        "enhanced": {"accuracy": 8, "completeness": 7, "specificity": 9, "actionability": 6.5, "notes": "cites pages"}
    }"#;

    #[test]
    fn parses_fenced_verdict() {
        let raw = format!("Here are the scores:\n```json\n{VERDICT}\n```\nThanks.");
        let verdict = parse_verdict(&raw).unwrap();
        assert_eq!(verdict.baseline.accuracy, 4.0);
        assert_eq!(verdict.enhanced.actionability, 6.5);
        assert_eq!(verdict.enhanced.notes, "cites pages");
    }

    #[test]
    fn parses_bare_verdict_with_surrounding_prose() {
        let raw = format!("Sure! {VERDICT} Hope this helps.");
        assert!(parse_verdict(&raw).is_ok());
    }

    #[test]
    fn missing_dimension_is_malformed() {
        let raw = r#"{"baseline": {"accuracy": 4, "completeness": 3, "specificity": 2},
                      "enhanced": {"accuracy": 8, "completeness": 7, "specificity": 9, "actionability": 6}}"#;
        assert!(matches!(parse_verdict(raw), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn out_of_range_score_is_malformed() {
        let raw = VERDICT.replace("\"specificity\": 9", "\"specificity\": 12");
        let err = parse_verdict(&raw).unwrap_err();
        assert!(err.to_string().contains("specificity"));
    }

    #[test]
    fn judge_prompt_lists_key_facts() {
        let query = Query::new("Tell me about the MBA", "prospective_student", &["iMBA", "Coursera"]);
        let prompt = judge_prompt(&query, "A", "B");
        assert!(prompt.contains("A user asked: \"Tell me about the MBA\""));
        assert!(prompt.contains("- iMBA\n- Coursera"));
    }

    #[tokio::test]
    async fn context_answer_embeds_reference_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("--- REFERENCE ---\\n# Example\\n--- END REFERENCE ---"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "with context"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(
            ApiKey::new("k"),
            "gpt-test",
            Some(server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let assistant = LlmAssistant::new(Arc::new(backend));

        let answer = assistant
            .generate_answer("What is Example?", Some("# Example"))
            .await
            .unwrap();
        assert_eq!(answer, "with context");
        assert_eq!(assistant.label(), "GPT (gpt-test)");
    }
}
