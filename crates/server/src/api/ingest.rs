use apalis::prelude::TaskSink;
use axum::{Json, extract::State, http::StatusCode};
use plastmem_core::{Document, StoreSummary};
use plastmem_shared::AppError;
use plastmem_worker::IngestDocumentsJob;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::utils::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestDocuments {
  pub documents: Vec<Document>,
}

/// Enqueue an ingest run on the background worker and return immediately.
/// Mirrors the teacher's `add_message` endpoint, which pushes a
/// segmentation job rather than processing inline.
#[utoipa::path(
  post,
  path = "/api/v0/documents",
  request_body = IngestDocuments,
  responses(
    (status = 202, description = "Ingest run enqueued"),
  )
)]
#[axum::debug_handler]
pub async fn ingest_documents(
  State(state): State<AppState>,
  Json(payload): Json<IngestDocuments>,
) -> Result<StatusCode, AppError> {
  let mut storage = state.ingest_job_storage.clone();
  storage
    .push(IngestDocumentsJob {
      documents: payload.documents,
    })
    .await?;
  Ok(StatusCode::ACCEPTED)
}

/// Run the ingest-and-evolve pipeline over a batch of documents and wait
/// for it to finish. An unspec'd convenience for small batches/tests that
/// want the `StoreSummary` back synchronously instead of polling for the
/// enqueued job's result; prefer `/api/v0/documents` for anything large
/// enough to risk holding the HTTP connection open for the whole run.
#[utoipa::path(
  post,
  path = "/api/v0/documents/sync",
  request_body = IngestDocuments,
  responses(
    (status = 200, description = "Ingest run completed", body = StoreSummary),
  )
)]
#[axum::debug_handler]
pub async fn ingest_documents_sync(
  State(state): State<AppState>,
  Json(payload): Json<IngestDocuments>,
) -> Json<StoreSummary> {
  let summary = state.engine.store(payload.documents).await;
  Json(summary)
}
