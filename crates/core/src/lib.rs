//! The storage-agnostic evolving memory engine: document ingestion, typed
//! fact extraction, ADD/UPDATE/DELETE/NONE evolution, consolidation into
//! higher-order insights, and the 3-stage intelligent query — all expressed
//! against the `StorageBackend` trait so a caller can plug in Postgres, an
//! in-memory store for tests, or anything else that implements it.

pub mod config;
pub mod consolidator;
pub mod decision;
pub mod document;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fact;
pub mod filter;
pub mod intelligent_query;
pub mod llm;
mod orchestrator;
pub mod storage;

pub use config::EngineConfig;
pub use decision::Decision;
pub use document::{
  ConversationDocument, ConversationMessage, Document, DocumentLike, FileDocument, TextDocument,
};
pub use engine::{Engine, StoreSummary};
pub use error::EngineError;
pub use fact::{Fact, Importance, Sensitivity};
pub use filter::{BoolOp, Filter, TagExpr, TagFilter};
pub use intelligent_query::{IntelligentQueryMetadata, IntelligentQueryResult};
pub use llm::{EmbeddingClient, OpenAiClient, ToolCallingClient};
pub use orchestrator::Progress;
pub use storage::{DocumentChunk, DocumentReference, QueryResult, StorageBackend, StoredDocument};

#[cfg(test)]
mod tests {
  mod test_support;

  mod decision_tests;
  mod document_tests;
  mod extractor_tests;
  mod orchestrator_tests;
}
