//! The public facade: everything a caller (the worker crate's job handlers,
//! the HTTP server, or a test) needs, with the concurrent pipeline internals
//! (`orchestrator`) kept private behind it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::consolidator::{self, CANONICAL_SUBJECTS};
use crate::document::Document;
use crate::error::EngineError;
use crate::fact::Fact;
use crate::filter::Filter;
use crate::intelligent_query::{self, IntelligentQueryResult};
use crate::llm::{EmbeddingClient, ToolCallingClient};
use crate::orchestrator::{self, Progress};
use crate::storage::{DocumentReference, QueryResult, StorageBackend};

/// The outcome of a non-streaming `store` call: how many of the input
/// documents were fully processed, and every error encountered along the
/// way. A document can be "processed" (counted) even if every fact it
/// produced was ultimately dropped by the decision engine (`NONE`).
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct StoreSummary {
  pub documents_total: usize,
  pub documents_processed: usize,
  pub errors: Vec<String>,
}

/// Ties a storage backend to the LLM/embedding clients and the tunables
/// that govern the ingest pipeline's concurrency. Cheap to clone (everything
/// inside is an `Arc`) regardless of whether the backend itself is `Clone`.
pub struct Engine<S: StorageBackend> {
  storage: Arc<S>,
  llm: Arc<dyn ToolCallingClient>,
  embedder: Arc<dyn EmbeddingClient>,
  config: EngineConfig,
}

impl<S: StorageBackend> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      storage: self.storage.clone(),
      llm: self.llm.clone(),
      embedder: self.embedder.clone(),
      config: self.config.clone(),
    }
  }
}

impl<S> Engine<S>
where
  S: StorageBackend + 'static,
{
  pub fn new(
    storage: Arc<S>,
    llm: Arc<dyn ToolCallingClient>,
    embedder: Arc<dyn EmbeddingClient>,
    config: EngineConfig,
  ) -> Self {
    Self {
      storage,
      llm,
      embedder,
      config,
    }
  }

  #[must_use]
  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// The authoritative streaming form: extract -> decide -> write, reporting
  /// progress and per-item errors as they happen. `progress` closes strictly
  /// before `errors`; both close on completion or cancellation.
  pub fn store_streaming(
    &self,
    docs: Vec<Document>,
    cancel: CancellationToken,
  ) -> (mpsc::Receiver<Progress>, mpsc::Receiver<EngineError>) {
    orchestrator::store_streaming(
      self.storage.clone(),
      self.llm.clone(),
      self.embedder.clone(),
      self.config.clone(),
      docs,
      cancel,
    )
  }

  /// Convenience wrapper over `store_streaming` that drains both channels to
  /// completion and returns a single summary. Never itself returns `Err` —
  /// individual failures are collected into `StoreSummary::errors` so one
  /// bad document never aborts the rest of the batch.
  pub async fn store(&self, docs: Vec<Document>) -> StoreSummary {
    let documents_total = docs.len();
    let cancel = CancellationToken::new();
    let (mut progress_rx, mut error_rx) = self.store_streaming(docs, cancel);

    let mut documents_processed = 0;
    let mut errors = Vec::new();

    loop {
      tokio::select! {
        progress = progress_rx.recv() => {
          match progress {
            Some(Progress { processed, .. }) => documents_processed = processed,
            None => break,
          }
        }
        err = error_rx.recv() => {
          match err {
            Some(err) => errors.push(err.to_string()),
            None => {}
          }
        }
      }
    }

    // Drain whatever errors arrived after progress closed.
    while let Some(err) = error_rx.recv().await {
      errors.push(err.to_string());
    }

    StoreSummary {
      documents_total,
      documents_processed,
      errors,
    }
  }

  /// Persist facts the caller has already built (e.g. facts restored from a
  /// backup, or produced by a process outside this pipeline). Facts missing
  /// a vector are embedded from their `content` before writing; facts that
  /// already carry one are written as-is.
  pub async fn store_facts_directly(&self, mut facts: Vec<Fact>) -> Result<(), EngineError> {
    for fact in &mut facts {
      if fact.vector.is_empty() {
        fact.vector = self.embedder.embed(&fact.content).await?;
      }
    }
    self.storage.store_batch(&facts).await
  }

  /// A single similarity + filter search. `text` is embedded once and used
  /// as the query vector; `filter` carries every other constraint.
  pub async fn query(&self, text: &str, filter: Filter) -> Result<QueryResult, EngineError> {
    if filter.importance_range_is_empty() || filter.resolved_limit() == 0 {
      return Ok(QueryResult::default());
    }
    let vector = self.embedder.embed(text).await?;
    self.storage.query(text, &vector, &filter).await
  }

  pub async fn intelligent_query(
    &self,
    text: &str,
    filter: &Filter,
  ) -> Result<IntelligentQueryResult, EngineError> {
    intelligent_query::intelligent_query(self.storage.as_ref(), self.embedder.as_ref(), text, filter).await
  }

  pub async fn get_document_references(
    &self,
    fact_id: Uuid,
  ) -> Result<Vec<DocumentReference>, EngineError> {
    self.storage.get_document_references(fact_id).await
  }

  pub async fn get_facts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Fact>, EngineError> {
    self.storage.get_facts_by_ids(ids).await
  }

  /// Run one consolidation sweep across every canonical subject bucket.
  /// Always explicit — never triggered by ordinary chat-turn ingestion,
  /// though the file-upload route triggers it once per run automatically.
  pub async fn run_consolidation(&self) -> Result<Vec<Fact>, EngineError> {
    consolidator::run_consolidation(
      self.storage.as_ref(),
      self.llm.as_ref(),
      self.embedder.as_ref(),
      CANONICAL_SUBJECTS,
    )
    .await
  }
}

/// Exposed for callers (the worker crate) that want to stamp a consolidation
/// run with the time it was requested rather than the time it completed.
#[must_use]
pub fn now() -> chrono::DateTime<Utc> {
  Utc::now()
}
