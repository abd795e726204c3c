//! Test doubles that let the extractor, decision engine, consolidator, and
//! orchestrator run without a network or a database.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use plastmem_ai::{ChatCompletionRequestMessage, ToolCall, ToolOutcome, ToolSpec};
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::llm::{EmbeddingClient, ToolCallingClient};

/// Replays a fixed queue of tool-call outcomes, one per `call_tools`
/// invocation, in the order given.
pub struct ScriptedLlmClient {
  queue: Mutex<VecDeque<ToolOutcome>>,
}

impl ScriptedLlmClient {
  pub fn new(outcomes: Vec<ToolOutcome>) -> Self {
    Self {
      queue: Mutex::new(outcomes.into()),
    }
  }

  pub fn single(outcome: ToolOutcome) -> Self {
    Self::new(vec![outcome])
  }

  pub fn tool_call(name: &str, arguments: serde_json::Value) -> ToolOutcome {
    ToolOutcome {
      tool_calls: vec![ToolCall {
        name: name.to_owned(),
        arguments,
      }],
      content: None,
    }
  }

  pub fn empty_content() -> ToolOutcome {
    ToolOutcome {
      tool_calls: Vec::new(),
      content: None,
    }
  }
}

#[async_trait]
impl ToolCallingClient for ScriptedLlmClient {
  async fn call_tools(
    &self,
    _messages: Vec<ChatCompletionRequestMessage>,
    _tools: Vec<ToolSpec>,
  ) -> Result<ToolOutcome, EngineError> {
    self
      .queue
      .lock()
      .await
      .pop_front()
      .ok_or_else(|| EngineError::LlmUnavailable(anyhow::anyhow!("scripted llm queue exhausted")))
  }
}

/// Deterministic bag-of-words embedding, good enough to exercise cosine
/// similarity and distance thresholds without a real model: near-identical
/// text embeds close, unrelated text embeds far apart.
pub struct HashEmbeddingClient;

const DIM: usize = 32;

fn embed_text(text: &str) -> Vec<f32> {
  let mut v = vec![0f32; DIM];
  for word in text.to_lowercase().split_whitespace() {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    word.hash(&mut hasher);
    let bucket = (hasher.finish() as usize) % DIM;
    v[bucket] += 1.0;
  }
  let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
  if norm > 0.0 {
    for x in &mut v {
      *x /= norm;
    }
  }
  v
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
  async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
    Ok(embed_text(text))
  }

  async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
    Ok(texts.iter().map(|t| embed_text(t)).collect())
  }
}
