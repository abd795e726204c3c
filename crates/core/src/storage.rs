use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::document::Document;
use crate::error::EngineError;
use crate::fact::Fact;
use crate::filter::Filter;

/// The original input, content-addressed by the SHA-256 hex of its content.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct StoredDocument {
  pub id: Uuid,
  pub content: String,
  pub content_hash: String,
  pub doc_type: String,
  pub original_id: String,
  pub metadata: HashMap<String, Json>,
  pub created_at: DateTime<Utc>,
}

/// One embedded chunk of a `FileDocument`.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct DocumentChunk {
  pub id: Uuid,
  pub content: String,
  pub vector: Vec<f32>,
  pub chunk_index: i32,
  pub original_document_id: Uuid,
  pub source: String,
  pub file_path: Option<String>,
  pub tags: Vec<String>,
  pub metadata: HashMap<String, Json>,
  pub created_at: DateTime<Utc>,
}

/// A single `StoredDocument` reference resolved behind a fact, as returned by
/// `get_document_references`.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct DocumentReference {
  pub id: Uuid,
  pub content: String,
  pub doc_type: String,
}

/// The result of a similarity + filter query: facts and file-document chunks,
/// both ordered by similarity.
#[derive(Clone, Debug, Default, Serialize, ToSchema)]
pub struct QueryResult {
  pub facts: Vec<Fact>,
  pub document_chunks: Vec<DocumentChunk>,
}

/// The pluggable persistence contract the core requires. Every operation is
/// atomic on its own row set and must be safe under concurrent callers; two
/// reference implementations exist (`plastmem_storage_postgres`,
/// `plastmem_storage_memory`).
#[async_trait]
pub trait StorageBackend: Send + Sync {
  /// Bring the schema up to date (adding any missing columns) without
  /// destroying existing data.
  async fn ensure_schema(&self) -> Result<(), EngineError>;

  /// Upsert a document by the SHA-256 of its content; returns the existing
  /// id when the hash already exists.
  async fn upsert_document(&self, doc: &Document) -> Result<Uuid, EngineError>;

  async fn get_stored_document(&self, id: Uuid) -> Result<StoredDocument, EngineError>;

  async fn get_stored_documents_batch(
    &self,
    ids: &[Uuid],
  ) -> Result<Vec<StoredDocument>, EngineError>;

  /// All-or-nothing for the batch; a partial failure is surfaced with
  /// per-row detail so the caller can emit one error event per failed row
  /// without losing the rows that did succeed.
  async fn store_batch(&self, facts: &[Fact]) -> Result<(), EngineError>;

  async fn query(&self, text: &str, vector: &[f32], filter: &Filter)
  -> Result<QueryResult, EngineError>;

  async fn get_by_id(&self, id: Uuid) -> Result<Option<Fact>, EngineError>;

  async fn get_facts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Fact>, EngineError>;

  /// Overwrite only `content` and `vector`; every other field (tags,
  /// document references, structured fields, metadata, timestamp) is
  /// preserved.
  async fn update(&self, id: Uuid, content: &str, vector: &[f32]) -> Result<(), EngineError>;

  async fn delete(&self, id: Uuid) -> Result<(), EngineError>;

  async fn delete_all(&self) -> Result<(), EngineError>;

  async fn get_document_references(
    &self,
    fact_id: Uuid,
  ) -> Result<Vec<DocumentReference>, EngineError>;
}
