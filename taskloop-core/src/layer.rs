//! Layer trait and abstractions.
//!
//! Inspired by OpenDAL's architecture, layers provide a composable way to wrap
//! LLM clients with cross-cutting concerns like logging or metering.

use crate::client::LlmClient;
use crate::error::TaskError;
use crate::types::{LlmRequest, LlmResponse};
use async_trait::async_trait;

/// Layer trait for wrapping LLM clients.
///
/// Each layer wraps an inner client and returns a new client with enhanced
/// behaviour. Composition uses static dispatch: stacking layers builds a
/// concrete nested type.
pub trait Layer<C: LlmClient> {
    /// The type of the layered client
    type LayeredClient: LlmClient;

    /// Wrap the inner client with this layer
    fn layer(&self, inner: C) -> Self::LayeredClient;
}

/// Helper trait for layered clients.
///
/// Provides a default forwarding implementation so implementers only override
/// what they intercept.
#[async_trait]
pub trait LayeredClient: Sized + LlmClient {
    /// The inner client type
    type Inner: LlmClient;

    /// Get a reference to the inner client
    fn inner(&self) -> &Self::Inner;

    /// Default implementation for chat - forwards to inner
    async fn layered_chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
        self.inner().chat(request).await
    }
}

/// Macro to implement [`LlmClient`] by forwarding to [`LayeredClient`] methods.
///
/// This reduces boilerplate for layered clients.
#[macro_export]
macro_rules! impl_layered_client {
    ($type:ty) => {
        #[async_trait::async_trait]
        impl $crate::client::LlmClient for $type {
            async fn chat(
                &self,
                request: &$crate::types::LlmRequest,
            ) -> Result<$crate::types::LlmResponse, $crate::error::TaskError> {
                $crate::layer::LayeredClient::layered_chat(self, request).await
            }
        }
    };
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

    #[derive(Debug)]
    struct StampClient {
        inner: EchoClient,
    }

    #[async_trait]
    impl LayeredClient for StampClient {
        type Inner = EchoClient;

        fn inner(&self) -> &Self::Inner {
            &self.inner
        }

        async fn layered_chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
            let mut response = self.inner().chat(request).await?;
            response.text = format!("stamped:{}", response.text);
            Ok(response)
        }
    }

    crate::impl_layered_client!(StampClient);

    struct ForwardLayer;

    impl<C: LlmClient> Layer<C> for ForwardLayer {
        type LayeredClient = C;

        fn layer(&self, inner: C) -> Self::LayeredClient {
            inner
        }
    }

    #[tokio::test]
    async fn macro_forwards_chat_through_layered_chat() {
        let client = StampClient { inner: EchoClient };
        let request = LlmRequest::new("sys", "payload");

        let response = client.chat(&request).await.unwrap();

        assert_eq!(response.text, "stamped:payload");
    }

    #[tokio::test]
    async fn identity_layer_returns_the_inner_client() {
        let client = ForwardLayer.layer(EchoClient);
        let request = LlmRequest::new("sys", "payload");

        let response = client.chat(&request).await.unwrap();

        assert_eq!(response.text, "payload");
    }
}
