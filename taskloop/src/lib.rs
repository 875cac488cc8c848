//! # Taskloop
//!
//! Bounded-retry execution loop and adaptive batch executor for verified LLM
//! tasks.
//!
//! Taskloop drives a four-stage task definition (Gather, Prompt, Verify,
//! Apply) through bounded attempts of a remote text-generation call,
//! accumulating refinement feedback across attempts and applying the result
//! exactly once on acceptance. For workloads made of many independent units
//! requiring one output per unit, the batch executor partitions the work and
//! recovers from remote output-length ceilings by recursively splitting
//! batches and escalating token budgets.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! taskloop = { version = "0.1", features = ["openai", "layers"] }
//! ```
//!
//! ```ignore
//! use taskloop::{Layer, Runner};
//! use taskloop::provider::OpenAiClient;
//! use taskloop::layer::LoggingLayer;
//!
//! # async fn example(mut pipeline: impl taskloop::Pipeline) -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::builder()
//!     .api_key("your-api-key")
//!     .default_model("gpt-4o-mini")
//!     .build()?;
//! let runner = Runner::new(LoggingLayer::new().layer(client));
//!
//! let report = runner.run(&mut pipeline).await?;
//! println!("{}", report.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Includes `openai` provider and `layers`
//! - `openai`: OpenAI-compatible transport
//! - `providers`: All available transports
//! - `layers`: Built-in transport layers (logging)
//! - `schema`: Structured-output schema generation via schemars
//! - `full`: All features enabled

// Re-export core types and traits
pub use taskloop_core::*;

// Re-export providers under `provider` module
#[cfg(feature = "taskloop-provider")]
pub mod provider {
    //! LLM transport implementations.
    pub use taskloop_provider::*;
}

// Re-export layers under `layer` module
#[cfg(feature = "taskloop-layer")]
pub mod layer {
    //! Built-in transport layers.
    pub use taskloop_layer::*;
}

// Re-export schemars when schema feature is enabled
#[cfg(feature = "schema")]
pub mod schemars {
    pub use ::schemars::*;
}

// Convenience re-exports at root level for common types
pub use taskloop_core::{
    batch::{BatchError, BatchExecutor},
    client::LlmClient,
    error::TaskError,
    layer::{Layer, LayeredClient},
    pipeline::{BatchPipeline, Pipeline},
    runner::{RunError, RunOptions, Runner, Transcript},
    types::{
        ApplyReport, FinishReason, LlmRequest, LlmResponse, RefineReason, RefineRequest, Verdict,
    },
    Result,
};

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use taskloop::prelude::*;
    //! ```

    pub use crate::{
        ApplyReport, BatchExecutor, BatchPipeline, FinishReason, Layer, LlmClient, LlmRequest,
        LlmResponse, Pipeline, RefineReason, RefineRequest, Result, RunOptions, Runner, TaskError,
        Verdict,
    };

    #[cfg(feature = "taskloop-provider")]
    pub use crate::provider::*;

    #[cfg(feature = "taskloop-layer")]
    pub use crate::layer::*;
}
