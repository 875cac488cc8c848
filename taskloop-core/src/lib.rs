//! # taskloop-core
//!
//! Core contracts and engines for running verified LLM tasks.
//!
//! This crate provides the four-stage [`Pipeline`] contract
//! (Gather/Prompt/Verify/Apply), the bounded-attempt [`Runner`] that turns a
//! non-deterministic remote call into a verified artifact, and the adaptive
//! [`BatchExecutor`] that recovers from remote output-length ceilings by
//! splitting workloads and escalating token budgets.

pub mod batch;
pub mod client;
pub mod error;
pub mod layer;
pub mod pipeline;
pub mod runner;
pub mod types;

// Re-exports
pub use batch::{BatchError, BatchExecutor, DEFAULT_BATCH_SIZE, ESCALATION_LADDER};
pub use client::LlmClient;
pub use error::TaskError;
pub use layer::{Layer, LayeredClient};
pub use pipeline::{BatchPipeline, Pipeline};
pub use runner::{AttemptRecord, RunError, RunOptions, Runner, Transcript};
pub use types::*;

/// Result type alias for task operations
pub type Result<T> = std::result::Result<T, TaskError>;
