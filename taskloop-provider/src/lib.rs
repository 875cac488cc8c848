//! # taskloop providers
//!
//! Transport implementations for the [`LlmClient`](taskloop_core::LlmClient)
//! contract.

pub mod openai;

// Re-exports
pub use openai::{OpenAiBuilder, OpenAiClient};

use taskloop_core::error::TaskError;

/// Create a DeepSeek client (OpenAI-compatible)
///
/// DeepSeek uses the OpenAI API protocol but with a different endpoint.
/// This is a convenience function that creates an OpenAI client configured
/// for DeepSeek's API endpoint.
///
/// # Example
///
/// ```ignore
/// use taskloop_provider::deepseek;
///
/// let client = deepseek("your-api-key", "deepseek-chat")?;
/// ```
pub fn deepseek(
    api_key: impl Into<String>,
    default_model: impl Into<String>,
) -> Result<OpenAiClient, TaskError> {
    OpenAiClient::builder()
        .api_key(api_key)
        .api_base("https://api.deepseek.com/v1")
        .default_model(default_model)
        .build()
}
