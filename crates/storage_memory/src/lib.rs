//! An in-process, `RwLock`-guarded implementation of `StorageBackend`, used
//! by the core crate's own test suite (and available to callers who want a
//! fast, database-free backend for unit tests of their own). Implements the
//! same filter semantics as the Postgres backend, including the boolean tag
//! expression tree and the widened-candidate-then-truncate distance rule —
//! trivially, since it just scans everything in memory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use plastmem_ai::cosine_similarity;
use plastmem_core::document::DocumentLike;
use plastmem_core::error::EngineError;
use plastmem_core::fact::Fact;
use plastmem_core::filter::{Filter, TagFilter};
use plastmem_core::storage::{
  DocumentChunk, DocumentReference, QueryResult, StorageBackend, StoredDocument,
};
use plastmem_core::Document;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
  facts: HashMap<Uuid, Fact>,
  documents: HashMap<Uuid, StoredDocument>,
  documents_by_hash: HashMap<String, Uuid>,
  chunks: HashMap<Uuid, DocumentChunk>,
}

/// In-memory reference implementation of `StorageBackend`.
#[derive(Default, Clone)]
pub struct InMemoryBackend {
  state: Arc<RwLock<State>>,
}

impl InMemoryBackend {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }
}

fn content_hash(content: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(content.as_bytes());
  format!("{:x}", hasher.finalize())
}

fn matches_filter(fact: &Fact, filter: &Filter) -> bool {
  if let Some(source) = &filter.source
    && &fact.source != source
  {
    return false;
  }
  if let Some(subject) = &filter.subject
    && &fact.subject != subject
  {
    return false;
  }
  if let Some(tags) = &filter.tags
    && !tags.evaluate(&fact.tags)
  {
    return false;
  }
  if let Some(category) = &filter.fact_category
    && &fact.category != category
  {
    return false;
  }
  if let Some(attribute) = &filter.fact_attribute
    && &fact.attribute != attribute
  {
    return false;
  }
  if let Some(file_path) = &filter.fact_file_path
    && fact.file_path.as_deref() != Some(file_path.as_str())
  {
    return false;
  }
  if let Some(importance) = filter.fact_importance
    && fact.importance.as_i16() != importance
  {
    return false;
  }
  if let Some(min) = filter.fact_importance_min
    && fact.importance.as_i16() < min
  {
    return false;
  }
  if let Some(max) = filter.fact_importance_max
    && fact.importance.as_i16() > max
  {
    return false;
  }
  if let Some(after) = filter.timestamp_after
    && fact.timestamp <= after
  {
    return false;
  }
  if let Some(before) = filter.timestamp_before
    && fact.timestamp >= before
  {
    return false;
  }
  if let Some(doc_ref) = filter.document_references
    && !fact.document_references.contains(&doc_ref)
  {
    return false;
  }
  true
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
  async fn ensure_schema(&self) -> Result<(), EngineError> {
    Ok(())
  }

  async fn upsert_document(&self, doc: &Document) -> Result<Uuid, EngineError> {
    let content = doc.content();
    let hash = content_hash(&content);
    let mut state = self.state.write().await;

    if let Some(existing) = state.documents_by_hash.get(&hash) {
      return Ok(*existing);
    }

    let id = Uuid::new_v4();
    let doc_type = match doc {
      Document::Text(_) => "text",
      Document::Conversation(_) => "conversation",
      Document::File(_) => "file",
    };
    let metadata: HashMap<String, serde_json::Value> = doc.metadata().clone();

    state.documents.insert(
      id,
      StoredDocument {
        id,
        content,
        content_hash: hash.clone(),
        doc_type: doc_type.to_owned(),
        original_id: doc.id().to_string(),
        metadata,
        created_at: Utc::now(),
      },
    );
    state.documents_by_hash.insert(hash, id);

    Ok(id)
  }

  async fn get_stored_document(&self, id: Uuid) -> Result<StoredDocument, EngineError> {
    self
      .state
      .read()
      .await
      .documents
      .get(&id)
      .cloned()
      .ok_or(EngineError::NotFound(id))
  }

  async fn get_stored_documents_batch(
    &self,
    ids: &[Uuid],
  ) -> Result<Vec<StoredDocument>, EngineError> {
    let state = self.state.read().await;
    Ok(ids.iter().filter_map(|id| state.documents.get(id).cloned()).collect())
  }

  async fn store_batch(&self, facts: &[Fact]) -> Result<(), EngineError> {
    let mut state = self.state.write().await;
    for fact in facts {
      state.facts.insert(fact.id, fact.clone());
    }
    Ok(())
  }

  async fn query(
    &self,
    _text: &str,
    vector: &[f32],
    filter: &Filter,
  ) -> Result<QueryResult, EngineError> {
    if filter.importance_range_is_empty() {
      return Ok(QueryResult::default());
    }

    let limit = filter.resolved_limit();
    if limit == 0 {
      return Ok(QueryResult::default());
    }

    let state = self.state.read().await;

    let mut scored: Vec<(f32, Fact)> = state
      .facts
      .values()
      .filter(|f| matches_filter(f, filter))
      .map(|f| {
        let similarity = cosine_similarity(vector, &f.vector);
        (similarity, f.clone())
      })
      .filter(|(similarity, _)| {
        filter.distance.is_none_or(|max_distance| {
          max_distance <= 0.0 || (1.0 - similarity) <= max_distance
        })
      })
      .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

    let mut chunks: Vec<DocumentChunk> = state
      .chunks
      .values()
      .filter(|c| filter.source.as_deref().is_none_or(|s| s == c.source))
      .cloned()
      .collect();
    chunks.sort_by(|a, b| {
      cosine_similarity(vector, &b.vector).total_cmp(&cosine_similarity(vector, &a.vector))
    });

    Ok(QueryResult {
      facts: scored.into_iter().map(|(_, f)| f).collect(),
      document_chunks: chunks,
    })
  }

  async fn get_by_id(&self, id: Uuid) -> Result<Option<Fact>, EngineError> {
    Ok(self.state.read().await.facts.get(&id).cloned())
  }

  async fn get_facts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Fact>, EngineError> {
    let state = self.state.read().await;
    Ok(ids.iter().filter_map(|id| state.facts.get(id).cloned()).collect())
  }

  async fn update(&self, id: Uuid, content: &str, vector: &[f32]) -> Result<(), EngineError> {
    let mut state = self.state.write().await;
    let fact = state.facts.get_mut(&id).ok_or(EngineError::NotFound(id))?;
    fact.content = content.to_owned();
    fact.vector = vector.to_vec();
    Ok(())
  }

  async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
    self.state.write().await.facts.remove(&id);
    Ok(())
  }

  async fn delete_all(&self) -> Result<(), EngineError> {
    let mut state = self.state.write().await;
    state.facts.clear();
    state.documents.clear();
    state.documents_by_hash.clear();
    state.chunks.clear();
    Ok(())
  }

  async fn get_document_references(
    &self,
    fact_id: Uuid,
  ) -> Result<Vec<DocumentReference>, EngineError> {
    let state = self.state.read().await;
    let fact = state.facts.get(&fact_id).ok_or(EngineError::NotFound(fact_id))?;

    Ok(
      fact
        .document_references
        .iter()
        .filter_map(|id| state.documents.get(id))
        .map(|doc| DocumentReference {
          id: doc.id,
          content: doc.content.clone(),
          doc_type: doc.doc_type.clone(),
        })
        .collect(),
    )
  }
}
