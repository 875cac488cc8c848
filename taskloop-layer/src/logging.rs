//! Logging layer for LLM transport operations.

use async_trait::async_trait;
use taskloop_core::client::LlmClient;
use taskloop_core::error::TaskError;
use taskloop_core::layer::{Layer, LayeredClient};
use taskloop_core::types::{LlmRequest, LlmResponse};

/// Logging layer that logs every chat call.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self {
            prefix: "[taskloop]".to_string(),
        }
    }

    /// Create a logging layer with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: LlmClient> Layer<C> for LoggingLayer {
    type LayeredClient = LoggingClient<C>;

    fn layer(&self, inner: C) -> Self::LayeredClient {
        LoggingClient {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Client wrapped with logging
#[derive(Debug)]
pub struct LoggingClient<C> {
    inner: C,
    prefix: String,
}

#[async_trait]
impl<C: LlmClient> LayeredClient for LoggingClient<C> {
    type Inner = C;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
        tracing::debug!(
            "{} chat request: model={}, max_tokens={}",
            self.prefix,
            request.model,
            request.max_tokens
        );

        let start = std::time::Instant::now();
        let result = self.inner.chat(request).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(
                    "{} chat success: finish_reason={:?}, chars={}, elapsed={:?}",
                    self.prefix,
                    response.finish_reason,
                    response.text.len(),
                    elapsed
                );
            }
            Err(e) => {
                tracing::error!("{} chat error: {:?}, elapsed={:?}", self.prefix, e, elapsed);
            }
        }

        result
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for LoggingClient<C> {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
        LayeredClient::layered_chat(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
            Ok(LlmResponse::complete(request.user_prompt.clone()))
        }
    }

    #[tokio::test]
    async fn logging_layer_forwards_responses_unchanged() {
        let client = LoggingLayer::new().layer(EchoClient);
        let request = LlmRequest::new("sys", "payload");

        let response = client.chat(&request).await.unwrap();

        assert_eq!(response.text, "payload");
        assert!(!response.is_truncated());
    }
}
