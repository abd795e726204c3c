//! The 3-stage intelligent query: consolidated insights first, the raw facts
//! that grounded each insight second, then enough fresh context to fill in
//! whatever the insights didn't cover.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EngineError;
use crate::fact::{Fact, CONSOLIDATED_TAG};
use crate::filter::{Filter, TagFilter};
use crate::llm::EmbeddingClient;
use crate::storage::StorageBackend;

const INSIGHT_DISTANCE: f32 = 0.7;
const INSIGHT_LIMIT: i64 = 10;
const CONTEXT_DISTANCE: f32 = 0.75;
const CONTEXT_LIMIT: i64 = 15;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntelligentQueryMetadata {
  pub queried_at: DateTime<Utc>,
  pub insight_count: usize,
  pub evidence_count: usize,
  pub context_count: usize,
  pub strategy: &'static str,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntelligentQueryResult {
  pub insights: Vec<Fact>,
  pub evidence: Vec<Fact>,
  pub context: Vec<Fact>,
  pub metadata: IntelligentQueryMetadata,
}

/// Stage 1: consolidated insights closest to the query. Stage 2: the raw
/// facts each returned insight cites as evidence. Stage 3: fresh, non-
/// consolidated context filling in what the insights didn't already cover,
/// with anything already surfaced in stages 1-2 excluded. `filter` carries
/// whatever other constraints (source, subject, category, ...) the caller
/// wants ANDed onto stages 1 and 3; its own `tags`/`distance`/`limit` are
/// overridden by each stage's fixed parameters.
pub async fn intelligent_query<S: StorageBackend>(
  storage: &S,
  embedder: &dyn EmbeddingClient,
  query_text: &str,
  filter: &Filter,
) -> Result<IntelligentQueryResult, EngineError> {
  let vector = embedder.embed(query_text).await?;

  let insight_filter = Filter {
    tags: Some(TagFilter::Any(vec![CONSOLIDATED_TAG.to_owned()])),
    distance: Some(INSIGHT_DISTANCE),
    limit: Some(INSIGHT_LIMIT),
    ..filter.clone()
  };
  let insights = storage.query(query_text, &vector, &insight_filter).await?.facts;

  let mut evidence_ids: Vec<Uuid> = insights.iter().flat_map(Fact::cited_source_fact_ids).collect();
  evidence_ids.sort();
  evidence_ids.dedup();
  let evidence = storage.get_facts_by_ids(&evidence_ids).await?;

  let seen: HashSet<Uuid> = insights
    .iter()
    .chain(evidence.iter())
    .map(|f| f.id)
    .collect();

  let context_filter = Filter {
    distance: Some(CONTEXT_DISTANCE),
    limit: Some(CONTEXT_LIMIT),
    ..filter.clone()
  };
  let context = storage
    .query(query_text, &vector, &context_filter)
    .await?
    .facts
    .into_iter()
    .filter(|f| !seen.contains(&f.id) && !f.is_consolidated())
    .collect();

  Ok(IntelligentQueryResult {
    metadata: IntelligentQueryMetadata {
      queried_at: Utc::now(),
      insight_count: insights.len(),
      evidence_count: evidence.len(),
      context_count: context.len(),
      strategy: "3-stage-intelligent",
    },
    insights,
    evidence,
    context,
  })
}
