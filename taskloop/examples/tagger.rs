//! Tag a list of note titles, one tag per note, via the batch executor.
//!
//! Run with: OPENAI_API_KEY=sk-... cargo run --example tagger --features full

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use taskloop::layer::LoggingLayer;
use taskloop::prelude::*;
use taskloop::provider::OpenAiClient;

#[derive(Debug, Deserialize, JsonSchema)]
struct TaggedNotes {
    tags: Vec<String>,
}

/// Assigns one topic tag to every note title it is given.
struct TaggerPipeline {
    notes: Vec<String>,
    max_tokens: u32,
}

#[async_trait::async_trait]
impl Pipeline for TaggerPipeline {
    type Gathered = Vec<String>;
    type Verified = Vec<(String, String)>;

    fn name(&self) -> &str {
        "tagger"
    }

    async fn gather(&mut self) -> Result<Self::Gathered> {
        Ok(self.notes.clone())
    }

    async fn prompt(&mut self, gathered: &Self::Gathered) -> Result<LlmRequest> {
        let schema = serde_json::to_value(schema_for!(TaggedNotes))?;
        Ok(LlmRequest::new(
            "You assign exactly one lowercase topic tag per note title. \
             Return a JSON object with a `tags` array, one entry per note, in order.",
            format!("Note titles:\n{}", gathered.join("\n")),
        )
        .with_max_tokens(self.max_tokens)
        .with_temperature(0.2)
        .with_schema(schema))
    }

    async fn verify(
        &mut self,
        gathered: &Self::Gathered,
        response: &LlmResponse,
    ) -> Result<Verdict<Self::Verified>> {
        let parsed: TaggedNotes = match serde_json::from_str(&response.text) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Ok(Verdict::refine(
                    "The previous output was not valid JSON for the `tags` object.",
                    RefineReason::InvalidStructure,
                ))
            }
        };
        if parsed.tags.len() != gathered.len() {
            return Ok(Verdict::refine(
                format!(
                    "You returned {} tags for {} notes. Return exactly one tag per note, ordered.",
                    parsed.tags.len(),
                    gathered.len()
                ),
                RefineReason::CountMismatch,
            ));
        }
        Ok(Verdict::Accepted(
            gathered.iter().cloned().zip(parsed.tags).collect(),
        ))
    }

    async fn apply(&mut self, verified: Self::Verified) -> Result<ApplyReport> {
        for (note, tag) in &verified {
            println!("{tag:>12}  {note}");
        }
        Ok(ApplyReport::new(false, "tagged notes", verified.len()))
    }
}

impl BatchPipeline for TaggerPipeline {
    type Unit = String;

    fn clone_pipeline(&self) -> Self {
        Self {
            notes: self.notes.clone(),
            max_tokens: self.max_tokens,
        }
    }

    fn preload(&mut self, units: Vec<Self::Unit>) {
        self.notes = units;
    }

    fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = max_tokens;
    }

    fn unit_id(unit: &Self::Unit) -> String {
        unit.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("OPENAI_API_KEY")?;
    let client = OpenAiClient::builder()
        .api_key(api_key)
        .default_model("gpt-4o-mini")
        .build()?;
    let runner = Runner::new(LoggingLayer::new().layer(client));

    let prototype = TaggerPipeline {
        notes: vec![
            "Sourdough starter feeding schedule".to_string(),
            "Borrow checker notes from the async book".to_string(),
            "Tokyo itinerary, day three".to_string(),
        ],
        max_tokens: 256,
    };

    let report = BatchExecutor::new()
        .with_batch_size(2)
        .run_batches(&runner, &prototype)
        .await?;
    println!("{} ({} actions, dry_run={})", report.summary, report.actions, report.dry_run);
    Ok(())
}
