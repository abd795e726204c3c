use axum::{Json, extract::State};
use plastmem_core::Fact;
use plastmem_shared::AppError;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct FactsByIds {
  pub ids: Vec<Uuid>,
}

/// Fetch a batch of facts by id, e.g. to resolve an insight's cited
/// evidence from a client that already has the `source_fact_*` ids.
#[utoipa::path(
  post,
  path = "/api/v0/facts/by_ids",
  request_body = FactsByIds,
  responses(
    (status = 200, description = "Facts matching the requested ids", body = Vec<Fact>),
  )
)]
#[axum::debug_handler]
pub async fn facts_by_ids(
  State(state): State<AppState>,
  Json(payload): Json<FactsByIds>,
) -> Result<Json<Vec<Fact>>, AppError> {
  let facts = state.engine.get_facts_by_ids(&payload.ids).await?;
  Ok(Json(facts))
}
