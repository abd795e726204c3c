use axum::{Json, extract::State};
use plastmem_core::{Filter, QueryResult};
use plastmem_shared::AppError;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::utils::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Query {
  pub text: String,
  #[serde(default)]
  pub filter: Filter,
}

/// A single similarity + filter search over the fact store.
#[utoipa::path(
  post,
  path = "/api/v0/query",
  request_body = Query,
  responses(
    (status = 200, description = "Matching facts and document chunks", body = QueryResult),
    (status = 400, description = "Query text cannot be empty")
  )
)]
#[axum::debug_handler]
pub async fn query(
  State(state): State<AppState>,
  Json(payload): Json<Query>,
) -> Result<Json<QueryResult>, AppError> {
  if payload.text.is_empty() {
    return Err(AppError::new(anyhow::anyhow!("query text cannot be empty")));
  }
  let result = state.engine.query(&payload.text, payload.filter).await?;
  Ok(Json(result))
}
