//! Wires the evolving-memory `Engine` up to two `apalis` job queues: one for
//! ingest runs (`IngestDocumentsJob`), one for consolidation sweeps
//! (`ConsolidationJob`). Grounded on the teacher's own `worker()` entry
//! point (`Monitor::new().register(..).shutdown_timeout(..).run_with_signal(..)`),
//! generalized from the teacher's single job queue to two, since this
//! system's ingest and consolidation passes have independent cadences.

use std::time::Duration;

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_postgres::PostgresStorage;
use plastmem_core::Engine;
use plastmem_shared::AppError;
use plastmem_storage_postgres::PostgresBackend;

mod jobs;
pub use jobs::{ConsolidationJob, IngestDocumentsJob, WorkerError, process_consolidation, process_ingest};

/// Run both job queues to completion (i.e. until shutdown signal). Mirrors
/// the teacher's single-`Monitor` shape; each job type gets its own
/// registered worker sharing the one `Engine`.
pub async fn worker(
  engine: Engine<PostgresBackend>,
  ingest_storage: PostgresStorage<IngestDocumentsJob>,
  consolidation_storage: PostgresStorage<ConsolidationJob>,
) -> Result<(), AppError> {
  Monitor::new()
    .register({
      let engine = engine.clone();
      WorkerBuilder::new("plastmem-ingest")
        .data(engine)
        .backend(ingest_storage)
        .build_fn(process_ingest)
    })
    .register({
      let engine = engine.clone();
      WorkerBuilder::new("plastmem-consolidation")
        .data(engine)
        .backend(consolidation_storage)
        .build_fn(process_consolidation)
    })
    .shutdown_timeout(Duration::from_secs(5))
    .run_with_signal(tokio::signal::ctrl_c())
    .await
    .map_err(|err| AppError::new(anyhow::anyhow!(err.to_string())))?;

  Ok(())
}
