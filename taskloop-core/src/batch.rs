//! Adaptive batch executor for unit-list pipelines.
//!
//! Output-length truncation and "the model produced invalid structure" look
//! identical to Verify, but they need different remedies: a refine loop cannot
//! fix a hard token ceiling. The executor classifies truncation on the typed
//! finish reason and then either reduces the requested output (recursive
//! halving) or raises the ceiling (budget escalation), preferring partial
//! recovery over total failure.

use crate::client::LlmClient;
use crate::error::TaskError;
use crate::pipeline::BatchPipeline;
use crate::runner::{truncate, RunError, Runner, Transcript};
use crate::types::ApplyReport;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;

/// Most conservative default: one unit per remote call.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Fixed ascending output-token budgets tried after splitting is exhausted.
pub const ESCALATION_LADDER: [u32; 5] = [768, 1024, 1280, 1536, 1792];

/// A batch-level failure.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The prototype pipeline could not gather its unit inventory
    #[error("gather units: {0}")]
    Gather(#[source] TaskError),

    /// A batch failed; the index is 1-based over the initial partition
    #[error("batch {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<BatchError>,
    },

    /// A run failed beyond recovery; `context` is a JSON diagnostic payload
    /// (stage label, truncated request and response, unit identities)
    /// sufficient for postmortem without re-invoking the remote service
    #[error("{source}; context={context}")]
    Diagnosed {
        context: String,
        #[source]
        source: Box<RunError>,
    },
}

#[derive(Debug, Serialize)]
struct RequestDigest {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    user_prompt: String,
}

#[derive(Debug, Serialize)]
struct DiagnosticContext {
    stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<RequestDigest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<String>,
    units: Vec<String>,
}

fn diagnose<P: BatchPipeline>(stage: &str, units: &[P::Unit], err: RunError) -> BatchError {
    let last = err.transcript().and_then(Transcript::last);
    let context = DiagnosticContext {
        stage: stage.to_string(),
        request: last.map(|attempt| RequestDigest {
            model: attempt.request.model.clone(),
            max_tokens: attempt.request.max_tokens,
            system_prompt: truncate(&attempt.request.system_prompt, 400),
            user_prompt: truncate(&attempt.request.user_prompt, 600),
        }),
        response: last.map(|attempt| truncate(&attempt.response.text, 600)),
        units: units.iter().map(P::unit_id).collect(),
    };
    let encoded = serde_json::to_string(&context).unwrap_or_else(|_| "{}".to_string());
    BatchError::Diagnosed {
        context: encoded,
        source: Box::new(err),
    }
}

/// Partitions a pipeline's gathered units into batches, runs each through the
/// runner, and recovers from output-length truncation by splitting batches
/// and escalating token budgets.
///
/// Processing is strictly sequential and depth-first: a batch's left half,
/// including all of its own recursive splits, fully resolves before the right
/// half begins. No two remote calls are ever in flight concurrently.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    batch_size: usize,
    escalation: Vec<u32>,
}

impl BatchExecutor {
    /// Create an executor with the default batch size and escalation ladder
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            escalation: ESCALATION_LADDER.to_vec(),
        }
    }

    /// Set the maximum units per batch; values below 1 keep the default
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        if batch_size > 0 {
            self.batch_size = batch_size;
        }
        self
    }

    /// Replace the ascending output-token escalation ladder
    pub fn with_escalation(mut self, ladder: Vec<u32>) -> Self {
        self.escalation = ladder;
        self
    }

    /// Gather the prototype's units once, then process contiguous batches of
    /// at most the configured size. Action counts sum, dry-run flags AND, and
    /// summaries concatenate across batches; any unrecovered batch failure
    /// aborts the whole call with a batch-indexed error.
    pub async fn run_batches<C, P>(
        &self,
        runner: &Runner<C>,
        prototype: &P,
    ) -> Result<ApplyReport, BatchError>
    where
        C: LlmClient,
        P: BatchPipeline + Sync,
    {
        let mut inventory = prototype.clone_pipeline();
        let units = inventory.gather().await.map_err(BatchError::Gather)?;
        let batches = chunk_units(units, self.batch_size.max(1));

        let mut merged: Option<ApplyReport> = None;
        for (index, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let report = self
                .process_batch(runner, prototype, batch)
                .await
                .map_err(|source| BatchError::Batch {
                    index: index + 1,
                    source: Box::new(source),
                })?;
            merged = Some(match merged {
                Some(acc) => acc.merge(report),
                None => report,
            });
        }

        Ok(merged.unwrap_or_else(|| {
            ApplyReport::new(true, format!("{}: no units gathered", prototype.name()), 0)
        }))
    }

    /// Process one batch: run it as-is, and on a length-limited failure split
    /// it in half (merging halves when they recover anything), then walk the
    /// escalation ladder. Non-length failures are fatal here; the runner
    /// already retried at the prompt/refine level.
    fn process_batch<'a, C, P>(
        &'a self,
        runner: &'a Runner<C>,
        prototype: &'a P,
        batch: Vec<P::Unit>,
    ) -> BoxFuture<'a, Result<ApplyReport, BatchError>>
    where
        C: LlmClient,
        P: BatchPipeline + Sync + 'a,
    {
        async move {
            let mut task = prototype.clone_pipeline();
            task.preload(batch.clone());
            let initial = match runner.run(&mut task).await {
                Ok(report) => return Ok(report),
                Err(err) if !err.is_length_limited() => {
                    return Err(diagnose::<P>("initial", &batch, err));
                }
                Err(err) => err,
            };

            tracing::debug!(
                task = prototype.name(),
                units = batch.len(),
                "batch hit the output token ceiling"
            );

            if batch.len() > 1 {
                let mid = batch.len() / 2;
                let left = self
                    .process_batch(runner, prototype, batch[..mid].to_vec())
                    .await?;
                let right = self
                    .process_batch(runner, prototype, batch[mid..].to_vec())
                    .await?;
                let merged = left.merge(right);
                if merged.actions > 0 {
                    return Ok(merged);
                }
            }

            for &tokens in &self.escalation {
                tracing::debug!(
                    task = prototype.name(),
                    units = batch.len(),
                    tokens,
                    "escalating output token budget"
                );
                let mut fallback = prototype.clone_pipeline();
                fallback.preload(batch.clone());
                fallback.set_max_tokens(tokens);
                match runner.run(&mut fallback).await {
                    Ok(report) => return Ok(report),
                    Err(err) if !err.is_length_limited() => {
                        return Err(diagnose::<P>(&format!("fallback-{tokens}"), &batch, err));
                    }
                    Err(_) => continue,
                }
            }

            Err(diagnose::<P>("final", &batch, initial))
        }
        .boxed()
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn chunk_units<U: Clone>(units: Vec<U>, size: usize) -> Vec<Vec<U>> {
    if units.is_empty() {
        return Vec::new();
    }
    units.chunks(size.max(1)).map(<[U]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::runner::RunOptions;
    use crate::types::{LlmRequest, LlmResponse, RefineReason, Verdict};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake service with a hard output ceiling: emitting one unit costs
    /// `per_unit_tokens`, and anything beyond `max_tokens` is cut off.
    #[derive(Debug)]
    struct CeilingClient {
        per_unit_tokens: u32,
        fail_on: Option<String>,
        calls: AtomicUsize,
    }

    impl CeilingClient {
        fn new(per_unit_tokens: u32) -> Self {
            Self {
                per_unit_tokens,
                fail_on: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for CeilingClient {
        async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(poison) = &self.fail_on {
                if request.user_prompt.contains(poison.as_str()) {
                    return Err(TaskError::provider("upstream rejected the request"));
                }
            }
            let units: Vec<&str> = request.user_prompt.split(',').collect();
            let needed = units.len() as u32 * self.per_unit_tokens;
            if needed > request.max_tokens {
                let keep = (request.max_tokens / self.per_unit_tokens) as usize;
                return Ok(LlmResponse::truncated(units[..keep].join(",")));
            }
            Ok(LlmResponse::complete(request.user_prompt.clone()))
        }
    }

    /// Unit-list pipeline: one output entry per unit, echoed back verbatim.
    struct UnitPipeline {
        source: Vec<String>,
        preloaded: Option<Vec<String>>,
        max_tokens: u32,
        dry_run: bool,
    }

    impl UnitPipeline {
        fn new(source: Vec<&str>, max_tokens: u32) -> Self {
            Self {
                source: source.into_iter().map(str::to_string).collect(),
                preloaded: None,
                max_tokens,
                dry_run: false,
            }
        }
    }

    #[async_trait]
    impl Pipeline for UnitPipeline {
        type Gathered = Vec<String>;
        type Verified = Vec<String>;

        fn name(&self) -> &str {
            "units"
        }

        async fn gather(&mut self) -> Result<Self::Gathered, TaskError> {
            match self.preloaded.take() {
                Some(units) => Ok(units),
                None => Ok(self.source.clone()),
            }
        }

        async fn prompt(&mut self, gathered: &Self::Gathered) -> Result<LlmRequest, TaskError> {
            Ok(LlmRequest::new("echo the units", gathered.join(","))
                .with_max_tokens(self.max_tokens))
        }

        async fn verify(
            &mut self,
            gathered: &Self::Gathered,
            response: &LlmResponse,
        ) -> Result<Verdict<Self::Verified>, TaskError> {
            let entries: Vec<String> = response
                .text
                .split(',')
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
            if entries.len() != gathered.len() {
                return Ok(Verdict::refine(
                    format!(
                        "you returned {} entries for {} units",
                        entries.len(),
                        gathered.len()
                    ),
                    RefineReason::CountMismatch,
                ));
            }
            Ok(Verdict::Accepted(entries))
        }

        async fn apply(&mut self, verified: Self::Verified) -> Result<ApplyReport, TaskError> {
            Ok(ApplyReport::new(
                self.dry_run,
                format!("applied {} units", verified.len()),
                verified.len(),
            ))
        }
    }

    impl BatchPipeline for UnitPipeline {
        type Unit = String;

        fn clone_pipeline(&self) -> Self {
            Self {
                source: self.source.clone(),
                preloaded: self.preloaded.clone(),
                max_tokens: self.max_tokens,
                dry_run: self.dry_run,
            }
        }

        fn preload(&mut self, units: Vec<Self::Unit>) {
            self.preloaded = Some(units);
        }

        fn set_max_tokens(&mut self, max_tokens: u32) {
            self.max_tokens = max_tokens;
        }

        fn unit_id(unit: &Self::Unit) -> String {
            unit.clone()
        }
    }

    fn single_attempt_runner(client: CeilingClient) -> Runner<CeilingClient> {
        Runner::with_options(
            client,
            RunOptions {
                max_attempts: 1,
                ..RunOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn batch_size_one_runs_each_unit_independently() {
        let runner = single_attempt_runner(CeilingClient::new(10));
        let prototype = UnitPipeline::new(vec!["a", "b", "c"], 100);
        let executor = BatchExecutor::new();

        let report = executor.run_batches(&runner, &prototype).await.unwrap();

        assert_eq!(report.actions, 3);
        assert_eq!(
            report.summary,
            "applied 1 units; applied 1 units; applied 1 units",
            "per-batch summaries must concatenate"
        );
        assert_eq!(runner_calls(&runner), 3);
    }

    #[tokio::test]
    async fn truncated_batch_splits_and_merges_halves() {
        // Two units need 120 tokens jointly but only 60 each; the joint call
        // truncates and both halves succeed on their own.
        let runner = single_attempt_runner(CeilingClient::new(60));
        let mut prototype = UnitPipeline::new(vec!["a", "b"], 100);
        prototype.dry_run = true;
        let executor = BatchExecutor::new().with_batch_size(2);

        let report = executor.run_batches(&runner, &prototype).await.unwrap();

        assert_eq!(report.actions, 2);
        assert!(report.dry_run, "dry-run must AND across merged halves");
        assert_eq!(runner_calls(&runner), 3);
    }

    #[tokio::test]
    async fn single_unit_exhausts_ladder_with_diagnostic() {
        // One unit that can never fit, even at the top of the ladder.
        let runner = single_attempt_runner(CeilingClient::new(10_000));
        let prototype = UnitPipeline::new(vec!["oversized"], 100);
        let executor = BatchExecutor::new();

        let err = executor.run_batches(&runner, &prototype).await.unwrap_err();

        // initial attempt plus one per ladder rung, then a hard stop
        assert_eq!(runner_calls(&runner), 1 + ESCALATION_LADDER.len());
        let rendered = err.to_string();
        assert!(rendered.starts_with("batch 1:"));
        assert!(rendered.contains("\"stage\":\"final\""));
        assert!(rendered.contains("oversized"));
    }

    #[tokio::test]
    async fn escalation_recovers_when_a_larger_budget_fits() {
        let mut client = CeilingClient::new(1000);
        client.fail_on = None;
        let runner = single_attempt_runner(client);
        let prototype = UnitPipeline::new(vec!["big"], 500);
        let executor = BatchExecutor::new();

        let report = executor.run_batches(&runner, &prototype).await.unwrap();

        assert_eq!(report.actions, 1);
        // initial (500), fallback 768, fallback 1024 succeeds
        assert_eq!(runner_calls(&runner), 3);
    }

    #[tokio::test]
    async fn non_length_failure_is_fatal_without_splitting() {
        let mut client = CeilingClient::new(10);
        client.fail_on = Some("poison".to_string());
        let runner = single_attempt_runner(client);
        let prototype = UnitPipeline::new(vec!["poison", "b"], 100);
        let executor = BatchExecutor::new().with_batch_size(2);

        let err = executor.run_batches(&runner, &prototype).await.unwrap_err();

        assert_eq!(runner_calls(&runner), 1, "non-length failure was re-attempted");
        let rendered = err.to_string();
        assert!(rendered.contains("\"stage\":\"initial\""));
        assert!(rendered.contains("poison"));
    }

    #[tokio::test]
    async fn empty_inventory_reports_zero_actions() {
        let runner = single_attempt_runner(CeilingClient::new(10));
        let prototype = UnitPipeline::new(vec![], 100);
        let executor = BatchExecutor::new();

        let report = executor.run_batches(&runner, &prototype).await.unwrap();

        assert_eq!(report.actions, 0);
        assert!(report.dry_run);
        assert_eq!(report.summary, "units: no units gathered");
        assert_eq!(runner_calls(&runner), 0);
    }

    #[test]
    fn chunking_is_contiguous_and_bounded() {
        let units: Vec<u32> = (0..7).collect();
        let batches = chunk_units(units, 3);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(chunk_units(Vec::<u32>::new(), 3).is_empty());
    }

    fn runner_calls(runner: &Runner<CeilingClient>) -> usize {
        runner_client(runner).calls()
    }

    fn runner_client(runner: &Runner<CeilingClient>) -> &CeilingClient {
        runner.client()
    }
}
