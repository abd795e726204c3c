use anyhow::anyhow;
use async_openai::{Client, config::OpenAIConfig, types::embeddings::CreateEmbeddingRequestArgs};
use plastmem_shared::{APP_CONFIG, AppError};

use crate::embed_shared::process_embedding;

pub async fn embed(input: &str) -> Result<Vec<f32>, AppError> {
  let config = OpenAIConfig::new()
    .with_api_key(&APP_CONFIG.openai_api_key)
    .with_api_base(&APP_CONFIG.openai_base_url);

  let client = Client::with_config(config);

  let request = CreateEmbeddingRequestArgs::default()
    .model(&APP_CONFIG.openai_embedding_model)
    .input(input)
    .dimensions(1024u32)
    .build()?;

  let embedding = client
    .embeddings()
    .create(request)
    .await
    .map(|r| r.data.into_iter())?
    .map(|e| e.embedding)
    .next_back()
    .ok_or_else(|| anyhow!("empty embedding"))?;

  process_embedding(embedding)
}
