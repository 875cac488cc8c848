//! # taskloop layers
//!
//! Built-in layers wrapping the [`LlmClient`](taskloop_core::LlmClient)
//! transport with cross-cutting concerns.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs every chat call with timing information
//!
//! ## Usage
//!
//! ```ignore
//! use taskloop_core::{Layer, Runner};
//! use taskloop_layer::LoggingLayer;
//!
//! let client = LoggingLayer::new().layer(transport);
//! let runner = Runner::new(client);
//! ```

pub mod logging;

// Re-exports
pub use logging::LoggingLayer;
