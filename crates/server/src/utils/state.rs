use apalis_postgres::PostgresStorage;
use plastmem_core::Engine;
use plastmem_storage_postgres::PostgresBackend;
use plastmem_worker::{ConsolidationJob, IngestDocumentsJob};

#[derive(Clone)]
pub struct AppState {
  pub engine: Engine<PostgresBackend>,
  pub ingest_job_storage: PostgresStorage<IngestDocumentsJob>,
  pub consolidation_job_storage: PostgresStorage<ConsolidationJob>,
}

impl AppState {
  #[must_use]
  pub const fn new(
    engine: Engine<PostgresBackend>,
    ingest_job_storage: PostgresStorage<IngestDocumentsJob>,
    consolidation_job_storage: PostgresStorage<ConsolidationJob>,
  ) -> Self {
    Self {
      engine,
      ingest_job_storage,
      consolidation_job_storage,
    }
  }
}
