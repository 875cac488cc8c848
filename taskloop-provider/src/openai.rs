//! OpenAI transport implementation using the async-openai crate.
//!
//! The transport maps the engine's request/response pair onto the chat
//! completions API and reports the service's finish reason as a typed field,
//! so callers classify output-length truncation structurally instead of
//! matching error text.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, ResponseFormat as OpenAIResponseFormat,
    ResponseFormatJsonSchema as OpenAIResponseFormatJsonSchema,
};
use async_openai::Client;
use async_trait::async_trait;
use taskloop_core::client::LlmClient;
use taskloop_core::error::TaskError;
use taskloop_core::types::{FinishReason, LlmRequest, LlmResponse};

const DEFAULT_MAX_TOKENS: u32 = 768;

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    default_model: String,
    default_max_tokens: u32,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .finish()
    }
}

impl OpenAiClient {
    /// Create a new client with default configuration
    pub fn new(api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);

        Self {
            client: Client::with_config(config),
            default_model: default_model.into(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create a builder for more configuration options
    pub fn builder() -> OpenAiBuilder {
        OpenAiBuilder::default()
    }

    /// Build the wire request, applying client defaults where the engine's
    /// request leaves model or token budget unset.
    fn build_request(&self, request: &LlmRequest) -> Result<CreateChatCompletionRequest, TaskError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.trim())
            .build()
            .map_err(|e| TaskError::provider(format!("failed to build system message: {}", e)))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_prompt.trim())
            .build()
            .map_err(|e| TaskError::provider(format!("failed to build user message: {}", e)))?;

        let model = if request.model.trim().is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };
        let max_tokens = if request.max_tokens > 0 {
            request.max_tokens
        } else {
            self.default_max_tokens
        };

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system),
                ChatCompletionRequestMessage::User(user),
            ])
            .max_tokens(max_tokens);

        // Several current models only accept the server default temperature.
        // A resolved value of 0 or 1 is omitted so the server default applies.
        if request.temperature != 0.0 && request.temperature != 1.0 {
            builder.temperature(request.temperature);
        }

        if let Some(schema) = &request.schema {
            builder.response_format(OpenAIResponseFormat::JsonSchema {
                json_schema: OpenAIResponseFormatJsonSchema {
                    name: "response".to_string(),
                    schema: Some(schema.clone()),
                    strict: Some(true),
                    description: None,
                },
            });
        }

        builder
            .build()
            .map_err(|e| TaskError::provider(format!("failed to build request: {}", e)))
    }

    fn convert_response(
        response: async_openai::types::CreateChatCompletionResponse,
    ) -> Result<LlmResponse, TaskError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TaskError::provider("chat completion returned no choices"))?;

        let finish_reason = choice
            .finish_reason
            .map_or(FinishReason::Stop, |reason| match reason {
                async_openai::types::FinishReason::Stop => FinishReason::Stop,
                async_openai::types::FinishReason::Length => FinishReason::Length,
                async_openai::types::FinishReason::ContentFilter => FinishReason::ContentFilter,
                other => FinishReason::Other(format!("{:?}", other).to_lowercase()),
            });

        let text = choice.message.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            // A truncated response may legitimately carry no usable text; the
            // typed finish reason still lets the caller classify it.
            if finish_reason == FinishReason::Length {
                return Ok(LlmResponse {
                    text,
                    finish_reason,
                });
            }
            if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
                return Err(TaskError::provider(format!(
                    "chat completion refusal: {}",
                    refusal.trim()
                )));
            }
            return Err(TaskError::provider("chat completion returned empty message"));
        }

        Ok(LlmResponse {
            text,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, TaskError> {
        let wire_request = self.build_request(request)?;
        tracing::debug!(
            model = %wire_request.model,
            max_tokens = wire_request.max_tokens,
            has_schema = request.schema.is_some(),
            "dispatching chat completion"
        );

        let response = self
            .client
            .chat()
            .create(wire_request)
            .await
            .map_err(|e| TaskError::provider(format!("OpenAI API error: {}", e)))?;

        Self::convert_response(response)
    }
}

/// Builder for the OpenAI client with custom configuration
#[derive(Default)]
pub struct OpenAiBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    org_id: Option<String>,
    default_model: Option<String>,
    default_max_tokens: Option<u32>,
}

impl OpenAiBuilder {
    /// Set API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set API base URL (for OpenAI-compatible APIs like DeepSeek)
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set organization ID
    pub fn organization(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Set the model used when a request leaves the model unset
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Set the token budget used when a request leaves max_tokens unset
    pub fn default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = Some(max_tokens);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<OpenAiClient, TaskError> {
        let api_key = self
            .api_key
            .ok_or_else(|| TaskError::configuration("API key is required"))?;
        let default_model = self
            .default_model
            .ok_or_else(|| TaskError::configuration("default model is required"))?;

        let mut config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(api_base) = self.api_base {
            config = config.with_api_base(api_base);
        }

        if let Some(org_id) = self.org_id {
            config = config.with_org_id(org_id);
        }

        Ok(OpenAiClient {
            client: Client::with_config(config),
            default_model,
            default_max_tokens: self.default_max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new("test-key", "gpt-4o-mini")
    }

    #[test]
    fn build_request_applies_defaults() {
        let request = LlmRequest::new("sys", "user");

        let wire = client().build_request(&request).unwrap();

        assert_eq!(wire.model, "gpt-4o-mini");
        assert_eq!(wire.max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert_eq!(wire.temperature, None);
    }

    #[test]
    fn build_request_keeps_explicit_values() {
        let request = LlmRequest::new("sys", "user")
            .with_model("gpt-4o")
            .with_max_tokens(1024)
            .with_temperature(0.2);

        let wire = client().build_request(&request).unwrap();

        assert_eq!(wire.model, "gpt-4o");
        assert_eq!(wire.max_tokens, Some(1024));
        assert_eq!(wire.temperature, Some(0.2));
    }

    #[test]
    fn default_temperature_is_omitted() {
        let request = LlmRequest::new("sys", "user").with_temperature(1.0);

        let wire = client().build_request(&request).unwrap();

        assert_eq!(wire.temperature, None);
    }

    #[test]
    fn schema_sets_strict_json_response_format() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "items": { "type": "array" } }
        });
        let request = LlmRequest::new("sys", "user").with_schema(schema.clone());

        let wire = client().build_request(&request).unwrap();

        match wire.response_format {
            Some(OpenAIResponseFormat::JsonSchema { json_schema }) => {
                assert_eq!(json_schema.schema, Some(schema));
                assert_eq!(json_schema.strict, Some(true));
            }
            other => panic!("expected JsonSchema response format, got {:?}", other),
        }
    }

    #[test]
    fn builder_requires_key_and_model() {
        let err = OpenAiClient::builder().build().unwrap_err();
        assert!(matches!(err, TaskError::Configuration(_)));

        let err = OpenAiClient::builder().api_key("k").build().unwrap_err();
        assert!(matches!(err, TaskError::Configuration(_)));
    }
}
