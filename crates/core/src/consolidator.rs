//! Periodic consolidation: synthesize higher-order facts from clusters of
//! existing ones, one canonical subject bucket at a time. Originals are never
//! deleted — consolidation only ever adds.

use std::collections::HashSet;

use chrono::Utc;
use plastmem_ai::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage, ToolSpec,
};
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::fact::{Fact, CATEGORIES, CONSOLIDATED_TAG, SOURCE_FACT_METADATA_PREFIX};
use crate::filter::Filter;
use crate::llm::{EmbeddingClient, ToolCallingClient};
use crate::storage::StorageBackend;

const CONSOLIDATE_TOOL: &str = "RECORD_INSIGHTS";

/// The fixed list of subject buckets consolidation sweeps every run.
pub const CANONICAL_SUBJECTS: &[&str] = &[
  "Family",
  "Career",
  "Health",
  "Goals",
  "Relationships",
  "Finances",
  "Education",
  "Work",
  "Hobbies",
  "Travel",
  "Home",
  "Food",
  "Technology",
  "Social",
  "Personality",
  "Values",
  "Routines",
  "Skills",
  "Events",
  "Identity",
];

const CANDIDATE_DISTANCE: f32 = 0.75;
const CANDIDATE_LIMIT: i64 = 30;
const CANDIDATE_IMPORTANCE_MIN: i16 = 2;

#[derive(Debug, Deserialize, JsonSchema)]
struct InsightArgs {
  category: String,
  subject: String,
  attribute: String,
  value: String,
  temporal_context: Option<String>,
  sensitivity: String,
  importance: i16,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RecordInsightsArgs {
  insights: Vec<InsightArgs>,
}

fn system_prompt() -> String {
  format!(
    "You consolidate a cluster of related memories about \"{{bucket}}\" into a small \
     number of higher-order facts that summarize or supersede them. Use the same \
     category set as raw extraction ({categories}). Emit only genuinely higher-order \
     insights — patterns, trends, or durable conclusions the individual facts support \
     together — never a verbatim restatement of a single input fact. Call {tool} once \
     with every insight found; call it with an empty list if the cluster yields none.",
    categories = CATEGORIES.join(", "),
    tool = CONSOLIDATE_TOOL,
  )
}

fn user_prompt(bucket: &str, candidates: &[Fact]) -> String {
  let list = candidates
    .iter()
    .enumerate()
    .map(|(i, f)| format!("[{i}] {}", f.content))
    .collect::<Vec<_>>()
    .join("\n");

  format!("Bucket: {bucket}\n\nMemories:\n{list}")
}

/// Run one consolidation sweep across every canonical bucket. Returns the
/// newly persisted insight facts (empty if nothing in any bucket qualified).
pub async fn run_consolidation<S: StorageBackend>(
  storage: &S,
  llm: &dyn ToolCallingClient,
  embedder: &dyn EmbeddingClient,
  subjects: &[&str],
) -> Result<Vec<Fact>, EngineError> {
  let mut produced = Vec::new();

  for &bucket in subjects {
    let vector = embedder.embed(bucket).await?;
    let filter = Filter {
      distance: Some(CANDIDATE_DISTANCE),
      limit: Some(CANDIDATE_LIMIT),
      fact_importance_min: Some(CANDIDATE_IMPORTANCE_MIN),
      ..Filter::default()
    };

    let result = storage.query(bucket, &vector, &filter).await?;
    let candidates: Vec<Fact> = result.facts.into_iter().filter(|f| !f.is_consolidated()).collect();

    if candidates.is_empty() {
      continue;
    }

    let new_facts = synthesize(bucket, &candidates, llm, embedder).await?;
    if new_facts.is_empty() {
      continue;
    }

    storage.store_batch(&new_facts).await?;
    produced.extend(new_facts);
  }

  Ok(produced)
}

async fn synthesize(
  bucket: &str,
  candidates: &[Fact],
  llm: &dyn ToolCallingClient,
  embedder: &dyn EmbeddingClient,
) -> Result<Vec<Fact>, EngineError> {
  let messages = vec![
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(system_prompt())),
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(user_prompt(
      bucket, candidates,
    ))),
  ];

  let tools = vec![ToolSpec::new::<RecordInsightsArgs>(
    CONSOLIDATE_TOOL,
    "Record every higher-order insight found in this bucket's cluster.",
  )];

  let outcome = llm.call_tools(messages, tools).await?;

  let Some(call) = outcome.tool_calls.into_iter().find(|c| c.name == CONSOLIDATE_TOOL) else {
    return Ok(Vec::new());
  };

  let args: RecordInsightsArgs = serde_json::from_value(call.arguments)
    .map_err(|err| EngineError::MalformedToolArguments(err.to_string()))?;

  let now = Utc::now();
  let source_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
  let document_refs: Vec<Uuid> = candidates
    .iter()
    .flat_map(|c| c.document_references.iter().copied())
    .collect::<HashSet<_>>()
    .into_iter()
    .collect();
  let source = candidates
    .first()
    .map(|f| f.source.clone())
    .unwrap_or_else(|| "consolidation".to_owned());

  let mut new_facts = Vec::with_capacity(args.insights.len());

  for insight in args.insights {
    let mut fact = Fact::new_structured(
      &insight.category,
      &insight.subject,
      &insight.attribute,
      &insight.value,
      insight.temporal_context,
      &insight.sensitivity,
      insight.importance,
      &source,
      None,
      document_refs.clone(),
      now,
    );

    fact.tags.push(CONSOLIDATED_TAG.to_owned());
    for (n, source_id) in source_ids.iter().enumerate() {
      fact.metadata.insert(
        format!("{SOURCE_FACT_METADATA_PREFIX}{n}"),
        serde_json::Value::String(source_id.to_string()),
      );
    }

    fact.vector = embedder.embed(&fact.content).await?;
    new_facts.push(fact);
  }

  Ok(new_facts)
}
