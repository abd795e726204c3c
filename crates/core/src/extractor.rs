use std::sync::Arc;

use chrono::Utc;
use plastmem_ai::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage, ToolSpec,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::document::{Document, DocumentLike};
use crate::error::EngineError;
use crate::fact::{Fact, CATEGORIES};
use crate::llm::ToolCallingClient;

const EXTRACT_FACTS_TOOL: &str = "EXTRACT_FACTS";

/// One fact as the model is asked to emit it.
#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractedFactArgs {
  category: String,
  subject: String,
  attribute: String,
  value: String,
  temporal_context: Option<String>,
  sensitivity: String,
  importance: i16,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractFactsArgs {
  facts: Vec<ExtractedFactArgs>,
}

fn system_prompt() -> String {
  format!(
    "You extract atomic, typed facts about the primary subject of a document. \
     Categories (closed set): {categories}. Sensitivity is one of low, medium, high. \
     Importance is 1 (low), 2 (medium), or 3 (high). Only extract a fact when you are \
     at least 7/10 confident it is true and durable; prefer quality over quantity — a \
     document with nothing memorable should yield zero facts. Call {tool} exactly once \
     with every fact you found; call it with an empty list if there are none.",
    categories = CATEGORIES.join(", "),
    tool = EXTRACT_FACTS_TOOL,
  )
}

/// Ask the LLM to extract facts from one document. Never errors for "no
/// facts found" — an empty document, or a document the model judges
/// unremarkable, simply yields an empty `Vec`.
pub async fn extract_facts(
  doc: &Document,
  llm: &Arc<dyn ToolCallingClient>,
  now: chrono::DateTime<Utc>,
) -> Result<Vec<Fact>, EngineError> {
  let content = doc.content();
  if content.trim().is_empty() {
    return Ok(Vec::new());
  }

  let messages = vec![
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(system_prompt())),
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(content)),
  ];

  let tools = vec![ToolSpec::new::<ExtractFactsArgs>(
    EXTRACT_FACTS_TOOL,
    "Record every fact extracted from the document.",
  )];

  let outcome = llm.call_tools(messages, tools).await?;

  let args = if let Some(call) = outcome
    .tool_calls
    .into_iter()
    .find(|c| c.name == EXTRACT_FACTS_TOOL)
  {
    serde_json::from_value::<ExtractFactsArgs>(call.arguments)
      .map_err(|err| EngineError::MalformedToolArguments(err.to_string()))?
  } else if let Some(text) = outcome.content {
    parse_fallback_json(&text)?
  } else {
    return Ok(Vec::new());
  };

  let doc_id = doc.id();
  let source = doc.source().to_owned();
  let file_path = doc.file_path().map(str::to_owned);
  let default_temporal_context = doc
    .timestamp()
    .unwrap_or(now)
    .format("%Y-%m-%d")
    .to_string();

  Ok(
    args
      .facts
      .into_iter()
      .map(|f| {
        let temporal_context = f.temporal_context.or_else(|| Some(default_temporal_context.clone()));
        Fact::new_structured(
          &f.category,
          &f.subject,
          &f.attribute,
          &f.value,
          temporal_context,
          &f.sensitivity,
          f.importance,
          &source,
          file_path.clone(),
          vec![doc_id],
          now,
        )
      })
      .collect(),
  )
}

/// Parse a fallback JSON block from free-text model output when no tool call
/// was made. Accepts an optional `<json>…</json>` wrapper and strips
/// decorative characters (e.g. markdown table pipes) before parsing.
fn parse_fallback_json(text: &str) -> Result<ExtractFactsArgs, EngineError> {
  let candidate = text
    .split("<json>")
    .nth(1)
    .and_then(|rest| rest.split("</json>").next())
    .unwrap_or(text)
    .trim();

  let cleaned: String = candidate.chars().filter(|&c| c != '|').collect();
  let cleaned = cleaned.trim();

  serde_json::from_str(cleaned)
    .map_err(|err| EngineError::MalformedToolArguments(format!("fallback parse: {err}")))
}
