use axum::{Json, extract::State};
use plastmem_core::{Filter, IntelligentQueryResult};
use plastmem_shared::AppError;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::utils::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IntelligentQuery {
  pub text: String,
  #[serde(default)]
  pub filter: Filter,
}

/// The 3-stage intelligent query: consolidated insights, the raw facts each
/// insight cites as evidence, then fresh context filling in what the
/// insights didn't already cover.
#[utoipa::path(
  post,
  path = "/api/v0/intelligent_query",
  request_body = IntelligentQuery,
  responses(
    (status = 200, description = "Insights, evidence and context", body = IntelligentQueryResult),
    (status = 400, description = "Query text cannot be empty")
  )
)]
#[axum::debug_handler]
pub async fn intelligent_query(
  State(state): State<AppState>,
  Json(payload): Json<IntelligentQuery>,
) -> Result<Json<IntelligentQueryResult>, AppError> {
  if payload.text.is_empty() {
    return Err(AppError::new(anyhow::anyhow!("query text cannot be empty")));
  }
  let result = state.engine.intelligent_query(&payload.text, &payload.filter).await?;
  Ok(Json(result))
}
