use axum::{
  Json, Router,
  routing::{get, post},
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::utils::AppState;

mod consolidate;
mod document_references;
mod facts_by_ids;
mod ingest;
mod intelligent_query;
mod query;

pub use consolidate::consolidate;
pub use document_references::{DocumentReferencesRequest, document_references};
pub use facts_by_ids::{FactsByIds, facts_by_ids};
pub use ingest::{IngestDocuments, ingest_documents, ingest_documents_sync};
pub use intelligent_query::{IntelligentQuery, intelligent_query};
pub use query::{Query, query};

#[derive(OpenApi)]
#[openapi(
  info(
    title = "Plast Mem API",
    version = "0.0.1",
    description = "Evolving memory engine: typed facts extracted and evolved from documents and conversations"
  ),
  paths(
    ingest::ingest_documents,
    ingest::ingest_documents_sync,
    query::query,
    intelligent_query::intelligent_query,
    document_references::document_references,
    facts_by_ids::facts_by_ids,
    consolidate::consolidate,
  ),
  components(schemas(
    IngestDocuments,
    Query,
    IntelligentQuery,
    DocumentReferencesRequest,
    FactsByIds,
    plastmem_core::Document,
    plastmem_core::TextDocument,
    plastmem_core::ConversationDocument,
    plastmem_core::ConversationMessage,
    plastmem_core::FileDocument,
    plastmem_core::Fact,
    plastmem_core::Sensitivity,
    plastmem_core::Importance,
    plastmem_core::Filter,
    plastmem_core::TagFilter,
    plastmem_core::TagExpr,
    plastmem_core::BoolOp,
    plastmem_core::StoreSummary,
    plastmem_core::QueryResult,
    plastmem_core::DocumentChunk,
    plastmem_core::DocumentReference,
    plastmem_core::IntelligentQueryResult,
    plastmem_core::IntelligentQueryMetadata,
  ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
  Json(ApiDoc::openapi())
}

pub fn app() -> Router<AppState> {
  Router::new()
    .route("/api/v0/documents", post(ingest_documents))
    .route("/api/v0/documents/sync", post(ingest_documents_sync))
    .route("/api/v0/query", post(query))
    .route("/api/v0/intelligent_query", post(intelligent_query))
    .route("/api/v0/document_references", post(document_references))
    .route("/api/v0/facts/by_ids", post(facts_by_ids))
    .route("/api/v0/consolidate", post(consolidate))
    .route("/openapi.json", get(openapi_json))
    .merge(Scalar::with_url("/openapi/", ApiDoc::openapi()))
}
