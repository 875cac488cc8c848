//! LLM client trait: the single remote call contract the runner consumes.

use crate::error::TaskError;
use crate::types::{LlmRequest, LlmResponse};
use async_trait::async_trait;

/// Request/response contract to the remote text-generation service.
///
/// Implementations return at most one response per call and must report a
/// typed [`FinishReason`](crate::types::FinishReason) on it; the engine never
/// retries transport errors itself. Recovery for output-length truncation is
/// delegated to the batch executor.
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug + 'static {
    /// Issue one chat completion call.
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError>;
}
