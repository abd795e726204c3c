use axum::{Json, extract::State};
use plastmem_core::DocumentReference;
use plastmem_shared::AppError;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentReferencesRequest {
  pub fact_id: Uuid,
}

/// The stored documents a single fact's `document_references` resolve to.
#[utoipa::path(
  post,
  path = "/api/v0/document_references",
  request_body = DocumentReferencesRequest,
  responses(
    (status = 200, description = "Resolved document references", body = Vec<DocumentReference>),
  )
)]
#[axum::debug_handler]
pub async fn document_references(
  State(state): State<AppState>,
  Json(payload): Json<DocumentReferencesRequest>,
) -> Result<Json<Vec<DocumentReference>>, AppError> {
  let refs = state.engine.get_document_references(payload.fact_id).await?;
  Ok(Json(refs))
}
