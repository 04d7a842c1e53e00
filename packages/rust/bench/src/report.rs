//! Report Aggregator: render a benchmark run as Markdown or JSON.
//!
//! Rendering is a pure function of the run and its aggregate: no clock, no
//! I/O, no backend calls.

use serde::Serialize;

use llmstxt_shared::{LlmsTxtError, Result, ScoringWeights};

use crate::aggregate::Aggregate;
use crate::types::{BenchmarkRun, Dimension, QueryOutcome};

/// Presentation options.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Characters of each answer quoted in excerpts.
    pub excerpt_chars: usize,
    /// Whether an `llms-full.txt` was used as context.
    pub full_context: bool,
    pub weights: ScoringWeights,
}

/// Render the Markdown report.
pub fn render_report(run: &BenchmarkRun, aggregate: &Aggregate, options: &ReportOptions) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("# llms.txt Benchmark Report".into());
    lines.push(String::new());
    lines.push(format!(
        "> Generated {} using {}",
        run.started_at.format("%Y-%m-%d %H:%M UTC"),
        run.answer_backend
    ));
    lines.push(String::new());

    // Configuration
    lines.push("## Configuration".into());
    lines.push(String::new());
    lines.push(format!("- **Run ID:** `{}`", run.run_id));
    let context_label = if options.full_context { "llms-full.txt" } else { "llms.txt" };
    lines.push(format!("- **{context_label} file:** `{}`", run.context_path));
    lines.push(format!(
        "- **Test queries:** {}",
        run.outcomes.len() + run.not_run.len()
    ));
    lines.push(format!("- **AI backend:** {}", run.answer_backend));
    let judge_note = if run.judge_backend == run.answer_backend {
        " (same backend)"
    } else {
        ""
    };
    lines.push(format!(
        "- **Scoring method:** LLM-as-judge, {}{judge_note}",
        run.judge_backend
    ));
    lines.push(format!("- **Dimension weights:** {}", format_weights(&options.weights)));
    if run.cancelled {
        lines.push("- **Status:** interrupted; results are partial".into());
    }
    lines.push(String::new());

    // Per-query results
    lines.push("## Per-Query Results".into());
    lines.push(String::new());
    for (i, outcome) in run.outcomes.iter().enumerate() {
        render_outcome(&mut lines, i + 1, outcome, options.excerpt_chars);
    }

    // Failed / unscored
    let failed: Vec<(usize, &QueryOutcome)> = run
        .outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| o.scored().is_none())
        .map(|(i, o)| (i + 1, o))
        .collect();
    if !failed.is_empty() || !run.not_run.is_empty() {
        lines.push("## Failed / Unscored Queries".into());
        lines.push(String::new());
        for (n, outcome) in &failed {
            let reason = outcome
                .failure
                .as_ref()
                .map(|f| format!("failed after {}: {}", f.stage, f.error))
                .unwrap_or_else(|| format!("ended {}", outcome.state));
            lines.push(format!("- Query {n}: {} ({reason})", outcome.query.query));
        }
        for query in &run.not_run {
            lines.push(format!("- Not run: {}", query.query));
        }
        lines.push(String::new());
    }

    // Summary
    render_summary(&mut lines, aggregate);

    // Methodology
    lines.push("## Methodology".into());
    lines.push(String::new());
    lines.push("This benchmark measures whether providing an llms.txt file as context to an AI assistant".into());
    lines.push("improves the quality of its responses about the website/organization.".into());
    lines.push(String::new());
    lines.push("For each test query:".into());
    lines.push("1. **Baseline**: The AI answers using only its general training knowledge (no llms.txt context)".into());
    lines.push("2. **Enhanced**: The AI answers with the llms.txt content injected as a system-level reference".into());
    lines.push("3. **Judging**: A separate LLM call scores both responses on accuracy, completeness,".into());
    lines.push("   specificity, and actionability (0-10 scale) against known key facts".into());
    lines.push(String::new());
    lines.push("Failed queries are excluded from the means. The overall score is the weighted mean of".into());
    lines.push("the dimension means; improvement is relative to the baseline overall score.".into());
    lines.push(String::new());

    lines.join("\n")
}

fn render_outcome(lines: &mut Vec<String>, n: usize, outcome: &QueryOutcome, excerpt_chars: usize) {
    lines.push(format!("### Query {n}: {}", outcome.query.query));
    lines.push(format!("*Category: {}*", outcome.query.category));
    lines.push(String::new());

    match outcome.scored() {
        Some(verdict) => {
            lines.push("| Criterion | Baseline | Enhanced | Delta |".into());
            lines.push("|-----------|----------|----------|-------|".into());
            for dimension in Dimension::ALL {
                let b = verdict.baseline.get(dimension);
                let e = verdict.enhanced.get(dimension);
                lines.push(format!(
                    "| {} | {b} | {e} | {} |",
                    dimension.label(),
                    signed(e - b)
                ));
            }
            lines.push(String::new());

            if !verdict.baseline.notes.trim().is_empty() {
                lines.push(format!("**Baseline note:** {}", verdict.baseline.notes.trim()));
            }
            if !verdict.enhanced.notes.trim().is_empty() {
                lines.push(format!("**Enhanced note:** {}", verdict.enhanced.notes.trim()));
            }
        }
        None => {
            let error = outcome
                .failure
                .as_ref()
                .map(|f| f.error.as_str())
                .unwrap_or("not scored");
            lines.push(format!("**Unscored:** {error}"));
        }
    }
    lines.push(String::new());

    if outcome.baseline.is_some() || outcome.enhanced.is_some() {
        lines.push("<details>".into());
        lines.push("<summary>Response excerpts (click to expand)</summary>".into());
        lines.push(String::new());
        if let Some(answer) = &outcome.baseline {
            lines.push("**Baseline response:**".into());
            lines.push(quote(&excerpt(answer, excerpt_chars)));
            lines.push(String::new());
        }
        if let Some(answer) = &outcome.enhanced {
            lines.push("**Enhanced response (with llms.txt):**".into());
            lines.push(quote(&excerpt(answer, excerpt_chars)));
            lines.push(String::new());
        }
        lines.push("</details>".into());
        lines.push(String::new());
    }
}

fn render_summary(lines: &mut Vec<String>, aggregate: &Aggregate) {
    lines.push("## Summary Scores (0-10 scale)".into());
    lines.push(String::new());
    lines.push(format!(
        "Scored queries: {} · Failed: {} · Not run: {}",
        aggregate.scored, aggregate.failed, aggregate.not_run
    ));
    lines.push(String::new());
    lines.push("| Criterion | Baseline (no context) | With llms.txt | Improvement |".into());
    lines.push("|-----------|----------------------|---------------|-------------|".into());
    for summary in &aggregate.dimensions {
        lines.push(format!(
            "| {} | {:.1} | {:.1} | {} |",
            summary.dimension.label(),
            summary.baseline_mean,
            summary.enhanced_mean,
            signed_1dp(summary.delta())
        ));
    }
    lines.push(format!(
        "| **Overall** | **{:.1}** | **{:.1}** | **{}** |",
        aggregate.baseline_overall,
        aggregate.enhanced_overall,
        signed_1dp(aggregate.overall_delta())
    ));
    lines.push(String::new());
    lines.push(format!(
        "**Overall improvement: {}**",
        format_improvement(aggregate.improvement_pct)
    ));
    lines.push(String::new());
}

/// Serialize the run and its aggregate as pretty JSON.
pub fn render_json(run: &BenchmarkRun, aggregate: &Aggregate) -> Result<String> {
    #[derive(Serialize)]
    struct JsonReport<'a> {
        run: &'a BenchmarkRun,
        aggregate: &'a Aggregate,
    }

    serde_json::to_string_pretty(&JsonReport { run, aggregate })
        .map_err(|e| LlmsTxtError::validation(format!("JSON serialization failed: {e}")))
}

/// `+12%`, `-3%`, or `undefined`.
pub fn format_improvement(pct: Option<f64>) -> String {
    match pct {
        Some(pct) => format!("{pct:+.0}%"),
        None => "undefined".into(),
    }
}

fn format_weights(weights: &ScoringWeights) -> String {
    Dimension::ALL
        .into_iter()
        .zip(weights.as_array())
        .map(|(d, w)| format!("{} {w}", d.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{value}")
    } else {
        format!("{value}")
    }
}

fn signed_1dp(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.1}")
    } else {
        format!("{value:.1}")
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
