use apalis::prelude::Data;
use plastmem_core::Engine;
use plastmem_storage_postgres::PostgresBackend;
use serde::{Deserialize, Serialize};

use super::WorkerError;

/// A sweep over every canonical subject bucket (§4.6). Carries no payload —
/// a run always covers the fixed bucket list — but is still a distinct
/// unit-struct job type so it can be scheduled independently of ingestion
/// (explicit `RunConsolidation` calls, and the one-per-run trigger the
/// file-upload ingest route fires).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsolidationJob;

pub async fn process_consolidation(
  _job: ConsolidationJob,
  engine: Data<Engine<PostgresBackend>>,
) -> Result<(), WorkerError> {
  let consolidated = engine.run_consolidation().await?;
  tracing::info!(
    consolidated_facts = consolidated.len(),
    "consolidation sweep completed"
  );
  Ok(())
}
