//! Benchmark domain types: queries, judge verdicts, and per-query outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use llmstxt_shared::RunId;

/// Highest score the judge may award on any dimension.
pub const MAX_SCORE: f64 = 10.0;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A test question and the facts a good answer should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub key_facts: Vec<String>,
}

fn default_category() -> String {
    "general".into()
}

impl Query {
    pub fn new(query: impl Into<String>, category: impl Into<String>, key_facts: &[&str]) -> Self {
        Self {
            query: query.into(),
            category: category.into(),
            key_facts: key_facts.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// One axis of the judge rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Accuracy,
    Completeness,
    Specificity,
    Actionability,
}

impl Dimension {
    /// Rubric order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Accuracy,
        Dimension::Completeness,
        Dimension::Specificity,
        Dimension::Actionability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Completeness => "completeness",
            Self::Specificity => "specificity",
            Self::Actionability => "actionability",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accuracy => "Accuracy",
            Self::Completeness => "Completeness",
            Self::Specificity => "Specificity",
            Self::Actionability => "Actionability",
        }
    }
}

/// The judge's scores for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerScore {
    pub accuracy: f64,
    pub completeness: f64,
    pub specificity: f64,
    pub actionability: f64,
    #[serde(default)]
    pub notes: String,
}

impl AnswerScore {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Accuracy => self.accuracy,
            Dimension::Completeness => self.completeness,
            Dimension::Specificity => self.specificity,
            Dimension::Actionability => self.actionability,
        }
    }

    /// First dimension outside `0..=MAX_SCORE`, if any.
    pub fn out_of_range(&self) -> Option<(Dimension, f64)> {
        Dimension::ALL
            .into_iter()
            .map(|d| (d, self.get(d)))
            .find(|(_, score)| !score.is_finite() || *score < 0.0 || *score > MAX_SCORE)
    }
}

/// Paired scores for the baseline and context-augmented answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub baseline: AnswerScore,
    pub enhanced: AnswerScore,
}

// ---------------------------------------------------------------------------
// Per-query state
// ---------------------------------------------------------------------------

/// Where a query is in the experiment.
///
/// `Pending → BaselineAnswered → ContextAnswered → Judged → Done`, or
/// `Failed` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Pending,
    BaselineAnswered,
    ContextAnswered,
    Judged,
    Done,
    Failed,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BaselineAnswered => "baseline_answered",
            Self::ContextAnswered => "context_answered",
            Self::Judged => "judged",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(&self, next: QueryState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::BaselineAnswered)
                | (Self::BaselineAnswered, Self::ContextAnswered)
                | (Self::ContextAnswered, Self::Judged)
                | (Self::Judged, Self::Done)
        ) || (!self.is_terminal() && next == Self::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a query ended `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    /// Last state reached before the failure.
    pub stage: QueryState,
    pub error: String,
}

/// Everything captured for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: Query,
    pub state: QueryState,
    /// Answer without context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    /// Answer with the document as context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<JudgeVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<QueryFailure>,
}

impl QueryOutcome {
    pub fn pending(query: Query) -> Self {
        Self {
            query,
            state: QueryState::Pending,
            baseline: None,
            enhanced: None,
            verdict: None,
            failure: None,
        }
    }

    /// Scores, when the query completed.
    pub fn scored(&self) -> Option<&JudgeVerdict> {
        match self.state {
            QueryState::Done => self.verdict.as_ref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// BenchmarkRun
// ---------------------------------------------------------------------------

/// A complete (or interrupted) benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub run_id: RunId,
    /// Label of the backend answering queries.
    pub answer_backend: String,
    /// Label of the backend judging answers.
    pub judge_backend: String,
    /// Document supplied as context.
    pub context_path: String,
    pub started_at: DateTime<Utc>,
    /// Queries that were started, in input order.
    pub outcomes: Vec<QueryOutcome>,
    /// Queries never started because the run was interrupted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_run: Vec<Query>,
    #[serde(default)]
    pub cancelled: bool,
}

impl BenchmarkRun {
    pub fn scored(&self) -> impl Iterator<Item = &JudgeVerdict> {
        self.outcomes.iter().filter_map(QueryOutcome::scored)
    }

    pub fn failed(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes.iter().filter(|o| o.state == QueryState::Failed)
    }
}
