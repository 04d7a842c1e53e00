//! Benchmark Harness: paired with/without-context answers plus a judged score per query.
//!
//! Queries run strictly in input order, one backend call at a time. Every
//! call (baseline, context, judge) goes through one shared [`Pacer`], so the
//! configured delay separates all successive requests regardless of which
//! backend serves them.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use llmstxt_shared::{CancelFlag, Pacer, RunId};

use crate::assistant::AssistantBackend;
use crate::types::{BenchmarkRun, Query, QueryFailure, QueryOutcome, QueryState};

/// Inputs that are not queries or backends.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Minimum interval between successive backend calls.
    pub delay: Duration,
    /// Path of the context document, recorded in the run.
    pub context_path: String,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for benchmark runs.
pub trait BenchProgress: Send + Sync {
    /// Called before a query's first backend call.
    fn query_started(&self, index: usize, total: usize, query: &str);
    /// Called after each state transition.
    fn state_changed(&self, index: usize, state: QueryState);
    /// Called when a query reaches `Done` or `Failed`.
    fn query_finished(&self, index: usize, outcome: &QueryOutcome);
}

/// No-op progress reporter.
pub struct SilentBenchProgress;

impl BenchProgress for SilentBenchProgress {
    fn query_started(&self, _index: usize, _total: usize, _query: &str) {}
    fn state_changed(&self, _index: usize, _state: QueryState) {}
    fn query_finished(&self, _index: usize, _outcome: &QueryOutcome) {}
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Drives the experiment for a query set.
pub struct Harness<'a> {
    answerer: &'a dyn AssistantBackend,
    judge: &'a dyn AssistantBackend,
    options: HarnessOptions,
    pacer: Pacer,
}

impl<'a> Harness<'a> {
    pub fn new(
        answerer: &'a dyn AssistantBackend,
        judge: &'a dyn AssistantBackend,
        options: HarnessOptions,
    ) -> Self {
        let pacer = Pacer::new(options.delay);
        Self {
            answerer,
            judge,
            options,
            pacer,
        }
    }

    /// Run every query against `context`.
    ///
    /// A failing query is recorded and the run continues. When `cancel` is
    /// set the in-flight call completes, the current query is marked failed,
    /// and the remaining queries are listed as not run.
    #[instrument(skip_all, fields(queries = queries.len(), answerer = %self.answerer.label()))]
    pub async fn run(
        &self,
        queries: &[Query],
        context: &str,
        cancel: &CancelFlag,
        progress: &dyn BenchProgress,
    ) -> BenchmarkRun {
        let mut run = BenchmarkRun {
            run_id: RunId::new(),
            answer_backend: self.answerer.label(),
            judge_backend: self.judge.label(),
            context_path: self.options.context_path.clone(),
            started_at: Utc::now(),
            outcomes: Vec::with_capacity(queries.len()),
            not_run: Vec::new(),
            cancelled: false,
        };

        info!(run_id = %run.run_id, context_chars = context.len(), "starting benchmark");

        for (i, query) in queries.iter().enumerate() {
            if cancel.is_cancelled() {
                run.cancelled = true;
                run.not_run.extend(queries[i..].iter().cloned());
                break;
            }

            progress.query_started(i, queries.len(), &query.query);
            let outcome = self.run_query(i, query, context, cancel, progress).await;
            progress.query_finished(i, &outcome);
            run.outcomes.push(outcome);
        }

        if cancel.is_cancelled() {
            run.cancelled = true;
        }

        info!(
            scored = run.scored().count(),
            failed = run.failed().count(),
            not_run = run.not_run.len(),
            cancelled = run.cancelled,
            "benchmark finished"
        );

        run
    }

    async fn run_query(
        &self,
        index: usize,
        query: &Query,
        context: &str,
        cancel: &CancelFlag,
        progress: &dyn BenchProgress,
    ) -> QueryOutcome {
        let mut outcome = QueryOutcome::pending(query.clone());

        // Baseline
        if let Err(error) = self.ready(cancel).await {
            return fail(outcome, error, index, progress);
        }
        match self.answerer.generate_answer(&query.query, None).await {
            Ok(answer) => outcome.baseline = Some(answer),
            Err(e) => return fail(outcome, e.to_string(), index, progress),
        }
        advance(&mut outcome, QueryState::BaselineAnswered, index, progress);

        // With context
        if let Err(error) = self.ready(cancel).await {
            return fail(outcome, error, index, progress);
        }
        match self.answerer.generate_answer(&query.query, Some(context)).await {
            Ok(answer) => outcome.enhanced = Some(answer),
            Err(e) => return fail(outcome, e.to_string(), index, progress),
        }
        advance(&mut outcome, QueryState::ContextAnswered, index, progress);

        // Judge
        if let Err(error) = self.ready(cancel).await {
            return fail(outcome, error, index, progress);
        }
        let (baseline, enhanced) = (
            outcome.baseline.as_deref().unwrap_or_default(),
            outcome.enhanced.as_deref().unwrap_or_default(),
        );
        match self.judge.judge(query, baseline, enhanced).await {
            Ok(verdict) => outcome.verdict = Some(verdict),
            Err(e) => return fail(outcome, e.to_string(), index, progress),
        }
        advance(&mut outcome, QueryState::Judged, index, progress);

        advance(&mut outcome, QueryState::Done, index, progress);
        outcome
    }

    /// Wait out the shared delay, unless the run was interrupted.
    async fn ready(&self, cancel: &CancelFlag) -> Result<(), String> {
        if cancel.is_cancelled() {
            return Err("cancelled".into());
        }
        self.pacer.wait().await;
        if cancel.is_cancelled() {
            return Err("cancelled".into());
        }
        Ok(())
    }
}

fn advance(outcome: &mut QueryOutcome, next: QueryState, index: usize, progress: &dyn BenchProgress) {
    debug_assert!(outcome.state.can_advance_to(next));
    debug!(query = index + 1, from = %outcome.state, to = %next, "query state change");
    outcome.state = next;
    progress.state_changed(index, next);
}

fn fail(
    mut outcome: QueryOutcome,
    error: String,
    index: usize,
    progress: &dyn BenchProgress,
) -> QueryOutcome {
    warn!(query = index + 1, stage = %outcome.state, %error, "query failed");
    outcome.failure = Some(QueryFailure {
        stage: outcome.state,
        error,
    });
    advance(&mut outcome, QueryState::Failed, index, progress);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use llmstxt_backends::BackendError;

    use crate::types::{AnswerScore, JudgeVerdict};

    fn score(value: f64) -> AnswerScore {
        AnswerScore {
            accuracy: value,
            completeness: value,
            specificity: value,
            actionability: value,
            notes: String::new(),
        }
    }

    /// Answers echo the question; questions containing "fail:<stage>" fail there.
    struct Scripted {
        calls: Mutex<Vec<String>>,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                cancel_after: None,
            }
        }

        fn record(&self, call: String) {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            if let Some((n, flag)) = &self.cancel_after {
                if calls.len() == *n {
                    flag.cancel();
                }
            }
        }
    }

    #[async_trait::async_trait]
    impl AssistantBackend for Scripted {
        fn label(&self) -> String {
            "Scripted".into()
        }

        async fn generate_answer(
            &self,
            question: &str,
            context: Option<&str>,
        ) -> Result<String, BackendError> {
            let stage = if context.is_some() { "context" } else { "baseline" };
            self.record(format!("{stage}:{question}"));
            if question.contains(&format!("fail:{stage}")) {
                return Err(BackendError::RateLimited);
            }
            Ok(format!("{stage} answer to {question}"))
        }

        async fn judge(
            &self,
            query: &Query,
            _baseline: &str,
            _enhanced: &str,
        ) -> Result<JudgeVerdict, BackendError> {
            self.record(format!("judge:{}", query.query));
            if query.query.contains("fail:judge") {
                return Err(BackendError::malformed("no JSON"));
            }
            Ok(JudgeVerdict {
                baseline: score(4.0),
                enhanced: score(8.0),
            })
        }
    }

    fn options() -> HarnessOptions {
        HarnessOptions {
            delay: Duration::ZERO,
            context_path: "llms.txt".into(),
        }
    }

    fn queries(texts: &[&str]) -> Vec<Query> {
        texts.iter().map(|t| Query::new(*t, "general", &[])).collect()
    }

    #[tokio::test]
    async fn calls_run_in_experiment_order() {
        let backend = Scripted::new();
        let harness = Harness::new(&backend, &backend, options());
        let run = harness
            .run(&queries(&["q1", "q2"]), "# Doc", &CancelFlag::new(), &SilentBenchProgress)
            .await;

        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec![
                "baseline:q1", "context:q1", "judge:q1", "baseline:q2", "context:q2", "judge:q2"
            ]
        );
        assert!(run.outcomes.iter().all(|o| o.state == QueryState::Done));
        assert_eq!(run.outcomes[0].enhanced.as_deref(), Some("context answer to q1"));
        assert_eq!(run.scored().count(), 2);
        assert_eq!(run.context_path, "llms.txt");
    }

    #[tokio::test]
    async fn failures_are_isolated_to_their_query() {
        let backend = Scripted::new();
        let harness = Harness::new(&backend, &backend, options());
        let run = harness
            .run(
                &queries(&["fail:baseline", "fail:context", "fail:judge", "ok"]),
                "# Doc",
                &CancelFlag::new(),
                &SilentBenchProgress,
            )
            .await;

        let stages: Vec<Option<QueryState>> = run
            .outcomes
            .iter()
            .map(|o| o.failure.as_ref().map(|f| f.stage))
            .collect();
        assert_eq!(
            stages,
            vec![
                Some(QueryState::Pending),
                Some(QueryState::BaselineAnswered),
                Some(QueryState::ContextAnswered),
                None
            ]
        );
        assert_eq!(run.failed().count(), 3);
        assert_eq!(run.outcomes[3].state, QueryState::Done);
        assert!(run.outcomes[1].baseline.is_some());
        assert!(run.outcomes[1].enhanced.is_none());
    }

    #[tokio::test]
    async fn cancellation_keeps_completed_scores() {
        let cancel = CancelFlag::new();
        let mut backend = Scripted::new();
        // Interrupt during the second query's baseline call.
        backend.cancel_after = Some((4, cancel.clone()));
        let harness = Harness::new(&backend, &backend, options());

        let run = harness
            .run(&queries(&["q1", "q2", "q3"]), "# Doc", &cancel, &SilentBenchProgress)
            .await;

        assert!(run.cancelled);
        assert_eq!(run.outcomes.len(), 2);
        assert_eq!(run.outcomes[0].state, QueryState::Done);
        assert_eq!(run.outcomes[1].state, QueryState::Failed);
        assert_eq!(run.outcomes[1].failure.as_ref().unwrap().error, "cancelled");
        assert!(run.outcomes[1].baseline.is_some());
        assert_eq!(run.not_run, queries(&["q3"]));
        assert_eq!(backend.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn judge_backend_is_separate_from_answerer() {
        let answerer = Scripted::new();
        let judge = Scripted::new();
        let harness = Harness::new(&answerer, &judge, options());
        harness
            .run(&queries(&["q"]), "# Doc", &CancelFlag::new(), &SilentBenchProgress)
            .await;

        assert_eq!(answerer.calls.lock().unwrap().len(), 2);
        assert_eq!(*judge.calls.lock().unwrap(), vec!["judge:q"]);
    }

    #[tokio::test]
    async fn delay_separates_every_backend_call() {
        let backend = Scripted::new();
        let mut options = options();
        options.delay = Duration::from_millis(20);
        let harness = Harness::new(&backend, &backend, options);

        let start = std::time::Instant::now();
        harness
            .run(&queries(&["q1", "q2"]), "# Doc", &CancelFlag::new(), &SilentBenchProgress)
            .await;

        // Six calls, five gaps.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
