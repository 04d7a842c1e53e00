//! Combine per-query verdicts into summary statistics.

use serde::Serialize;

use llmstxt_shared::ScoringWeights;

use crate::types::{BenchmarkRun, Dimension, JudgeVerdict};

/// Mean scores for one rubric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DimensionSummary {
    pub dimension: Dimension,
    pub baseline_mean: f64,
    pub enhanced_mean: f64,
}

impl DimensionSummary {
    pub fn delta(&self) -> f64 {
        self.enhanced_mean - self.baseline_mean
    }
}

/// Aggregate statistics over the scored queries of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    /// Queries that reached `Done`.
    pub scored: usize,
    /// Queries that ended `Failed`.
    pub failed: usize,
    /// Queries never started.
    pub not_run: usize,
    /// One summary per dimension, in rubric order.
    pub dimensions: Vec<DimensionSummary>,
    /// Weighted mean of the baseline dimension means.
    pub baseline_overall: f64,
    /// Weighted mean of the enhanced dimension means.
    pub enhanced_overall: f64,
    /// `(enhanced - baseline) / baseline * 100`; `None` when undefined.
    pub improvement_pct: Option<f64>,
}

impl Aggregate {
    pub fn overall_delta(&self) -> f64 {
        self.enhanced_overall - self.baseline_overall
    }
}

/// Aggregate the run's scored queries. Failed and unrun queries are counted
/// but contribute nothing to the means.
pub fn aggregate(run: &BenchmarkRun, weights: &ScoringWeights) -> Aggregate {
    let verdicts: Vec<&JudgeVerdict> = run.scored().collect();

    let dimensions: Vec<DimensionSummary> = Dimension::ALL
        .into_iter()
        .map(|dimension| DimensionSummary {
            dimension,
            baseline_mean: mean(verdicts.iter().map(|v| v.baseline.get(dimension))),
            enhanced_mean: mean(verdicts.iter().map(|v| v.enhanced.get(dimension))),
        })
        .collect();

    let weights = weights.as_array();
    let baseline_overall = weighted_mean(dimensions.iter().map(|d| d.baseline_mean), &weights);
    let enhanced_overall = weighted_mean(dimensions.iter().map(|d| d.enhanced_mean), &weights);

    let improvement_pct = (!verdicts.is_empty() && baseline_overall > 0.0)
        .then(|| (enhanced_overall - baseline_overall) / baseline_overall * 100.0);

    Aggregate {
        scored: verdicts.len(),
        failed: run.failed().count(),
        not_run: run.not_run.len(),
        dimensions,
        baseline_overall,
        enhanced_overall,
        improvement_pct,
    }
}

/// Arithmetic mean, 0 for no values.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn weighted_mean(values: impl Iterator<Item = f64>, weights: &[f64; 4]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    values.zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use llmstxt_shared::RunId;

    use crate::types::{AnswerScore, Query, QueryFailure, QueryOutcome, QueryState};

    fn answer(scores: [f64; 4]) -> AnswerScore {
        AnswerScore {
            accuracy: scores[0],
            completeness: scores[1],
            specificity: scores[2],
            actionability: scores[3],
            notes: String::new(),
        }
    }

    fn done(baseline: [f64; 4], enhanced: [f64; 4]) -> QueryOutcome {
        let mut outcome = QueryOutcome::pending(Query::new("q", "general", &[]));
        outcome.baseline = Some("b".into());
        outcome.enhanced = Some("e".into());
        outcome.verdict = Some(JudgeVerdict {
            baseline: answer(baseline),
            enhanced: answer(enhanced),
        });
        outcome.state = QueryState::Done;
        outcome
    }

    fn failed() -> QueryOutcome {
        let mut outcome = QueryOutcome::pending(Query::new("broken", "general", &[]));
        outcome.state = QueryState::Failed;
        outcome.failure = Some(QueryFailure {
            stage: QueryState::Pending,
            error: "rate limited".into(),
        });
        outcome
    }

    fn run(outcomes: Vec<QueryOutcome>) -> BenchmarkRun {
        BenchmarkRun {
            run_id: RunId::new(),
            answer_backend: "A".into(),
            judge_backend: "J".into(),
            context_path: "llms.txt".into(),
            started_at: Utc::now(),
            outcomes,
            not_run: vec![],
            cancelled: false,
        }
    }

    #[test]
    fn single_query_means_equal_its_scores() {
        let agg = aggregate(
            &run(vec![done([4.0, 3.0, 2.0, 1.0], [8.0, 7.0, 9.0, 6.0])]),
            &ScoringWeights::default(),
        );

        assert_eq!(agg.scored, 1);
        let baseline: Vec<f64> = agg.dimensions.iter().map(|d| d.baseline_mean).collect();
        let enhanced: Vec<f64> = agg.dimensions.iter().map(|d| d.enhanced_mean).collect();
        assert_eq!(baseline, vec![4.0, 3.0, 2.0, 1.0]);
        assert_eq!(enhanced, vec![8.0, 7.0, 9.0, 6.0]);
        assert_eq!(agg.baseline_overall, 2.5);
        assert_eq!(agg.enhanced_overall, 7.5);
        assert_eq!(agg.improvement_pct, Some(200.0));
    }

    #[test]
    fn failed_queries_are_excluded_from_means() {
        let agg = aggregate(
            &run(vec![failed(), done([5.0; 4], [6.0; 4]), done([7.0; 4], [8.0; 4])]),
            &ScoringWeights::default(),
        );

        assert_eq!(agg.scored, 2);
        assert_eq!(agg.failed, 1);
        assert_eq!(agg.baseline_overall, 6.0);
        assert_eq!(agg.enhanced_overall, 7.0);
    }

    #[test]
    fn zero_baseline_makes_improvement_undefined() {
        let agg = aggregate(&run(vec![done([0.0; 4], [5.0; 4])]), &ScoringWeights::default());
        assert_eq!(agg.improvement_pct, None);

        let agg = aggregate(&run(vec![failed()]), &ScoringWeights::default());
        assert_eq!(agg.scored, 0);
        assert_eq!(agg.improvement_pct, None);
    }

    #[test]
    fn weights_shift_the_overall_mean() {
        let weights = ScoringWeights {
            accuracy: 3.0,
            completeness: 1.0,
            specificity: 0.0,
            actionability: 0.0,
        };
        let agg = aggregate(&run(vec![done([8.0, 4.0, 0.0, 0.0], [8.0; 4])]), &weights);
        assert_eq!(agg.baseline_overall, 7.0);
        assert_eq!(agg.enhanced_overall, 8.0);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let outcomes = vec![done([3.0, 4.0, 5.0, 6.0], [7.0, 7.5, 8.0, 9.0]), failed()];
        let a = aggregate(&run(outcomes.clone()), &ScoringWeights::default());
        let b = aggregate(&run(outcomes), &ScoringWeights::default());
        assert_eq!(a, b);
    }
}
