use apalis::prelude::TaskSink;
use axum::{http::StatusCode, extract::State};
use plastmem_shared::AppError;
use plastmem_worker::ConsolidationJob;

use crate::utils::AppState;

/// Enqueue a consolidation sweep across every canonical subject bucket.
/// Runs on the background worker, same as the automatic sweep the
/// file-ingest route triggers once per run.
#[utoipa::path(
  post,
  path = "/api/v0/consolidate",
  responses(
    (status = 202, description = "Consolidation sweep enqueued"),
  )
)]
#[axum::debug_handler]
pub async fn consolidate(State(state): State<AppState>) -> Result<StatusCode, AppError> {
  let mut storage = state.consolidation_job_storage.clone();
  storage.push(ConsolidationJob).await?;
  Ok(StatusCode::ACCEPTED)
}
