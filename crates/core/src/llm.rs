use async_trait::async_trait;
use plastmem_ai::{ChatCompletionRequestMessage, ToolOutcome, ToolSpec};

use crate::error::EngineError;

/// Everything the extractor and decision engine need from a chat model: a
/// single tool-calling round trip. Abstracted so tests can substitute a
/// scripted stub instead of reaching a real LLM endpoint.
#[async_trait]
pub trait ToolCallingClient: Send + Sync {
  async fn call_tools(
    &self,
    messages: Vec<ChatCompletionRequestMessage>,
    tools: Vec<ToolSpec>,
  ) -> Result<ToolOutcome, EngineError>;
}

/// Everything the pipeline needs from an embedding model.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
  async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError>;
  async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}

/// Production adapter: forwards to `plastmem_ai`'s OpenAI-compatible client.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiClient;

#[async_trait]
impl ToolCallingClient for OpenAiClient {
  async fn call_tools(
    &self,
    messages: Vec<ChatCompletionRequestMessage>,
    tools: Vec<ToolSpec>,
  ) -> Result<ToolOutcome, EngineError> {
    plastmem_ai::generate_with_tools(messages, tools)
      .await
      .map_err(|err| EngineError::LlmUnavailable(anyhow::anyhow!(err.to_string())))
  }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
  async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
    plastmem_ai::embed(text)
      .await
      .map_err(|err| EngineError::EmbeddingFailed(anyhow::anyhow!(err.to_string())))
  }

  async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
    plastmem_ai::embed_many(texts)
      .await
      .map_err(|err| EngineError::EmbeddingFailed(anyhow::anyhow!(err.to_string())))
  }
}
