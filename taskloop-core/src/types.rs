//! Core types shared by pipelines, the runner and the batch executor.

use serde::{Deserialize, Serialize};

/// Why the remote service stopped generating output.
///
/// Carried on every [`LlmResponse`] so callers can classify truncation
/// structurally instead of matching substrings of error text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

/// A single request to the text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// System instructions
    pub system_prompt: String,

    /// User instructions
    pub user_prompt: String,

    /// Output token cap; 0 lets the transport apply its default
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Model identifier; empty lets the transport apply its default
    pub model: String,

    /// Optional structured-output schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

impl LlmRequest {
    /// Create a new request from system and user instructions
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 0,
            temperature: 0.0,
            model: String::new(),
            schema: None,
        }
    }

    /// Set the output token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the structured-output schema
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// The raw outcome of one remote call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Raw response text
    pub text: String,

    /// Typed stop signal reported by the service
    pub finish_reason: FinishReason,
}

impl LlmResponse {
    /// Create a response that completed normally
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// Create a response cut off by the output token ceiling
    pub fn truncated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: FinishReason::Length,
        }
    }

    /// Whether the service stopped because it hit the output token ceiling
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }
}

/// Machine-stable tag describing why verification rejected a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RefineReason {
    InvalidStructure,
    MissingSection,
    CountMismatch,
    LowConfidence,
    EmptyResponse,
    DisallowedFormatting,
    LengthLimited,
    Other(String),
}

impl RefineReason {
    /// Stable tag for logging and classification
    pub fn as_str(&self) -> &str {
        match self {
            RefineReason::InvalidStructure => "invalid-structure",
            RefineReason::MissingSection => "missing-section",
            RefineReason::CountMismatch => "count-mismatch",
            RefineReason::LowConfidence => "low-confidence",
            RefineReason::EmptyResponse => "empty-response",
            RefineReason::DisallowedFormatting => "disallowed-formatting",
            RefineReason::LengthLimited => "length-limited",
            RefineReason::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for RefineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback a pipeline attaches to a rejected attempt.
///
/// The delta is appended verbatim to the next attempt's user instructions;
/// the reason is a stable tag used for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineRequest {
    pub prompt_delta: String,
    pub reason: RefineReason,
}

impl RefineRequest {
    /// Create a refine request
    pub fn new(prompt_delta: impl Into<String>, reason: RefineReason) -> Self {
        Self {
            prompt_delta: prompt_delta.into(),
            reason,
        }
    }
}

/// Outcome of a pipeline's Apply stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Whether changes were simulated rather than performed
    pub dry_run: bool,

    /// Human-readable summary
    pub summary: String,

    /// Count of actions taken (or simulated)
    pub actions: usize,
}

impl ApplyReport {
    /// Create a report
    pub fn new(dry_run: bool, summary: impl Into<String>, actions: usize) -> Self {
        Self {
            dry_run,
            summary: summary.into(),
            actions,
        }
    }

    /// Combine two reports: actions sum, dry-run ANDs, summaries concatenate.
    pub fn merge(self, other: ApplyReport) -> ApplyReport {
        ApplyReport {
            dry_run: self.dry_run && other.dry_run,
            summary: format!(
                "{}; {}",
                self.summary.trim(),
                other.summary.trim()
            ),
            actions: self.actions + other.actions,
        }
    }
}

/// The three distinguishable outcomes of a Verify stage.
///
/// Verify-level defects travel on the `Err` branch of the surrounding
/// `Result`; a rejection without a refine request is fatal to the run.
#[derive(Debug)]
pub enum Verdict<V> {
    /// The response was accepted; the verified payload goes to Apply.
    Accepted(V),
    /// The response was rejected, optionally with refinement guidance.
    Rejected { refine: Option<RefineRequest> },
}

impl<V> Verdict<V> {
    /// Reject with refinement guidance
    pub fn refine(prompt_delta: impl Into<String>, reason: RefineReason) -> Self {
        Verdict::Rejected {
            refine: Some(RefineRequest::new(prompt_delta, reason)),
        }
    }

    /// Reject with no safe retry path
    pub fn reject() -> Self {
        Verdict::Rejected { refine: None }
    }
}
