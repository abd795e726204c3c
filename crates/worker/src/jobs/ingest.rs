use apalis::prelude::Data;
use plastmem_core::{Document, Engine};
use plastmem_storage_postgres::PostgresBackend;
use serde::{Deserialize, Serialize};

use super::WorkerError;

/// One run of the ingest-and-evolve pipeline (§2, §4.5) over a batch of
/// documents supplied by a caller (an HTTP upload, a backfill script).
/// Carries the documents themselves rather than a reference, mirroring the
/// teacher's `CreateEpisodicMemoryJob` (job payload owns its input rather
/// than pointing back at caller-held state that might not outlive the job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestDocumentsJob {
  pub documents: Vec<Document>,
}

/// Drives `Engine::store` to completion, logging (not failing the job on)
/// per-document errors the orchestrator collected — a single malformed
/// document must not lose the rest of the batch. `Engine::store` itself
/// runs the one consolidation pass a file route is owed (§4.5); this job
/// does not enqueue a second one.
pub async fn process_ingest(
  job: IngestDocumentsJob,
  engine: Data<Engine<PostgresBackend>>,
) -> Result<(), WorkerError> {
  let total = job.documents.len();

  let summary = engine.store(job.documents).await;

  if !summary.errors.is_empty() {
    tracing::warn!(
      documents_total = summary.documents_total,
      documents_processed = summary.documents_processed,
      error_count = summary.errors.len(),
      "ingest run completed with per-document errors"
    );
  } else {
    tracing::info!(documents = total, "ingest run completed");
  }

  Ok(())
}
