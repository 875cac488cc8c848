//! Attempt loop driving one pipeline to an applied result or a descriptive failure.

use crate::client::LlmClient;
use crate::error::TaskError;
use crate::pipeline::Pipeline;
use crate::types::{ApplyReport, FinishReason, LlmRequest, LlmResponse, RefineRequest, Verdict};
use std::fmt;
use std::time::Duration;

/// Bounds for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum Prompt -> chat -> Verify cycles; values below 1 behave as 1
    pub max_attempts: u32,

    /// Time budget for each remote call, scoped per attempt
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(45),
        }
    }
}

/// One Prompt -> chat -> Verify cycle, kept only to build failure transcripts.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub request: LlmRequest,
    pub response: LlmResponse,
    pub refine: Option<RefineRequest>,
    pub accepted: bool,
}

/// Ordered attempt log rendered into failure messages.
///
/// Remote failures are not reproducible locally, so the transcript is the
/// primary debugging aid. Prompts and responses are length-bounded before
/// rendering.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    attempts: Vec<AttemptRecord>,
}

impl Transcript {
    fn push(&mut self, record: AttemptRecord) {
        self.attempts.push(record);
    }

    /// Recorded attempts in chronological order
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// The last attempt, if any
    pub fn last(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, attempt) in self.attempts.iter().enumerate() {
            writeln!(f, "Attempt {}:", idx + 1)?;
            writeln!(f, "  Model: {}", attempt.request.model)?;
            writeln!(
                f,
                "  MaxTokens: {} Temp: {:.2}",
                attempt.request.max_tokens, attempt.request.temperature
            )?;
            writeln!(f, "  System Prompt:")?;
            writeln!(f, "{}", indent_block(&truncate(&attempt.request.system_prompt, 1000)))?;
            writeln!(f, "  User Prompt:")?;
            writeln!(f, "{}", indent_block(&truncate(&attempt.request.user_prompt, 1200)))?;
            writeln!(f, "  Response:")?;
            writeln!(f, "{}", indent_block(&truncate(&attempt.response.text, 1200)))?;
            if let Some(refine) = &attempt.refine {
                writeln!(f, "  Refine Suggestion:")?;
                writeln!(f, "{}", indent_block(&truncate(&refine.prompt_delta, 600)))?;
                writeln!(f, "  Refine Reason: {}", refine.reason)?;
            }
            let status = if attempt.accepted { "accepted" } else { "rejected" };
            writeln!(f, "  Status: {status}")?;
        }
        Ok(())
    }
}

/// A run failure, tagged with the stage that produced it.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Upstream data was unavailable; never retried
    #[error("gather: {0}")]
    Gather(#[source] TaskError),

    /// The pipeline failed to build a request
    #[error("prompt: {0}")]
    Prompt(#[source] TaskError),

    /// The remote call failed or timed out
    #[error("llm chat: {0}")]
    Transport(#[source] TaskError),

    /// A defect in the verification logic itself
    #[error("verify: {0}")]
    Verify(#[source] TaskError),

    /// Verification rejected the response and offered no retry direction
    #[error("verify rejected result and no refine request provided")]
    RejectedWithoutGuidance,

    /// The response hit the output token ceiling; refinement cannot fix a
    /// hard ceiling, so the run fails fast for the batch executor to recover
    #[error("response truncated at {max_tokens} output tokens\n{transcript}")]
    LengthLimited { max_tokens: u32, transcript: Transcript },

    /// Every attempt was rejected
    #[error("exhausted {attempts} attempts without acceptance\n{transcript}")]
    AttemptsExhausted { attempts: u32, transcript: Transcript },

    /// Side effects failed after acceptance; never retried
    #[error("apply: {0}")]
    Apply(#[source] TaskError),
}

impl RunError {
    /// Whether this failure is a hard output-length truncation, the one
    /// class of failure the batch executor recovers from.
    pub fn is_length_limited(&self) -> bool {
        matches!(self, RunError::LengthLimited { .. })
    }

    /// The attempt transcript, when this failure carries one
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            RunError::LengthLimited { transcript, .. }
            | RunError::AttemptsExhausted { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}

/// Drives one [`Pipeline`] through bounded attempts to an accepted, applied
/// result or a descriptive failure.
///
/// The runner holds no state across runs; concurrent runs on independently
/// constructed pipelines are safe.
#[derive(Debug)]
pub struct Runner<C> {
    client: C,
    options: RunOptions,
}

impl<C: LlmClient> Runner<C> {
    /// Create a runner with default options
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: RunOptions::default(),
        }
    }

    /// Create a runner with explicit options
    pub fn with_options(client: C, options: RunOptions) -> Self {
        Self { client, options }
    }

    /// The options in effect
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// The underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run the pipeline: Gather once, loop Prompt -> chat -> Verify under the
    /// attempt ceiling, then Apply exactly once on acceptance.
    pub async fn run<P: Pipeline>(&self, pipeline: &mut P) -> Result<ApplyReport, RunError> {
        let gathered = pipeline.gather().await.map_err(RunError::Gather)?;

        let max_attempts = self.options.max_attempts.max(1);
        let mut transcript = Transcript::default();
        let mut guidance: Vec<String> = Vec::new();
        let mut verified = None;

        for attempt in 1..=max_attempts {
            let mut request = pipeline.prompt(&gathered).await.map_err(RunError::Prompt)?;
            if !guidance.is_empty() {
                request.user_prompt = append_refinements(&request.user_prompt, &guidance);
            }

            tracing::debug!(
                task = pipeline.name(),
                attempt,
                max_attempts,
                model = %request.model,
                max_tokens = request.max_tokens,
                "sending attempt"
            );

            let response =
                match tokio::time::timeout(self.options.timeout, self.client.chat(&request)).await
                {
                    Ok(Ok(response)) => response,
                    Ok(Err(err)) => return Err(RunError::Transport(err)),
                    Err(_) => {
                        return Err(RunError::Transport(TaskError::Timeout(self.options.timeout)))
                    }
                };

            match pipeline
                .verify(&gathered, &response)
                .await
                .map_err(RunError::Verify)?
            {
                Verdict::Accepted(output) => {
                    transcript.push(AttemptRecord {
                        request,
                        response,
                        refine: None,
                        accepted: true,
                    });
                    verified = Some(output);
                    break;
                }
                Verdict::Rejected { refine } => {
                    let truncated = response.finish_reason == FinishReason::Length;
                    let max_tokens = request.max_tokens;
                    if let Some(refine) = &refine {
                        tracing::debug!(
                            task = pipeline.name(),
                            attempt,
                            reason = %refine.reason,
                            "attempt rejected"
                        );
                    }
                    transcript.push(AttemptRecord {
                        request,
                        response,
                        refine: refine.clone(),
                        accepted: false,
                    });
                    if truncated {
                        return Err(RunError::LengthLimited {
                            max_tokens,
                            transcript,
                        });
                    }
                    match refine {
                        Some(refine) => guidance.push(refine.prompt_delta),
                        None => return Err(RunError::RejectedWithoutGuidance),
                    }
                }
            }
        }

        match verified {
            Some(output) => pipeline.apply(output).await.map_err(RunError::Apply),
            None => Err(RunError::AttemptsExhausted {
                attempts: max_attempts,
                transcript,
            }),
        }
    }
}

/// Append every accumulated guidance block, in chronological order, as a
/// delimited refine section. Earlier guidance must survive later attempts.
fn append_refinements(user_prompt: &str, guidance: &[String]) -> String {
    let mut out = user_prompt.trim_end_matches('\n').to_string();
    for delta in guidance {
        let trimmed = delta.trim();
        let block = if trimmed.is_empty() {
            "REFINE:\n<empty>".to_string()
        } else {
            format!("REFINE:\n{trimmed}")
        };
        if out.is_empty() {
            out = block;
        } else {
            out = format!("{out}\n\n{block}");
        }
    }
    out
}

pub(crate) fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}\u{2026}")
}

fn indent_block(block: &str) -> String {
    if block.is_empty() {
        return "    <empty>".to_string();
    }
    block
        .lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
