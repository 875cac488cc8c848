//! Pipeline contract: the four-stage task definition the runner drives.

use crate::error::TaskError;
use crate::types::{ApplyReport, LlmRequest, LlmResponse, Verdict};
use async_trait::async_trait;

/// A task expressed as four stages: Gather, Prompt, Verify, Apply.
///
/// The engine treats the gathered and verified payloads as opaque; concrete
/// task kinds are independent implementations selected by whoever constructs
/// them. A pipeline instance belongs to a single run: the runner calls Gather
/// once, loops Prompt/Verify over bounded attempts, and calls Apply at most
/// once after acceptance.
///
/// Prompt must regenerate the full base request on every call. The runner
/// appends accumulated refinement guidance itself and never caches requests
/// across attempts.
#[async_trait]
pub trait Pipeline: Send {
    /// Task-defined payload produced by Gather and consumed by Prompt/Verify
    type Gathered: Send + Sync;

    /// Task-defined payload accepted by Verify and consumed by Apply
    type Verified: Send;

    /// Task identity, used in logs and error context
    fn name(&self) -> &str;

    /// Collect the upstream input. Failure here is fatal and never retried.
    async fn gather(&mut self) -> Result<Self::Gathered, TaskError>;

    /// Build a fresh base request for one attempt.
    async fn prompt(&mut self, gathered: &Self::Gathered) -> Result<LlmRequest, TaskError>;

    /// Judge one response. Return `Err` only for defects in the verification
    /// logic itself; content problems are rejections carried in the verdict.
    async fn verify(
        &mut self,
        gathered: &Self::Gathered,
        response: &LlmResponse,
    ) -> Result<Verdict<Self::Verified>, TaskError>;

    /// Perform the task's side effects for an accepted output.
    async fn apply(&mut self, verified: Self::Verified) -> Result<ApplyReport, TaskError>;
}

/// Extra capabilities the batch executor needs from a pipeline whose gathered
/// input is a list of independent units with 1:1 output correspondence.
pub trait BatchPipeline:
    Pipeline<Gathered = Vec<<Self as BatchPipeline>::Unit>> + Sized
{
    /// One independent unit of work
    type Unit: Clone + Send + Sync;

    /// Independent copy sharing only read-only collaborators.
    fn clone_pipeline(&self) -> Self;

    /// Inject a pre-gathered unit subset; the next Gather must return exactly
    /// these units and skip its own collection side effects.
    fn preload(&mut self, units: Vec<Self::Unit>);

    /// Override the output token budget used by subsequent Prompt calls.
    fn set_max_tokens(&mut self, max_tokens: u32);

    /// Stable identity of a unit, used in failure diagnostics.
    fn unit_id(unit: &Self::Unit) -> String;
}
