use std::fmt;

use plastmem_shared::AppError;
use uuid::Uuid;

/// Error kinds the engine can produce. Every variant maps to one of the
/// abstract failure kinds in the storage contract and error-handling design:
/// most are per-item and let the pipeline continue, a few (`Cancelled`,
/// `StorageUnavailable`) are batch- or run-scoped.
#[derive(Debug)]
pub enum EngineError {
  /// Document is empty or of an unrecognized type. Surfaced per-document.
  InputInvalid(String),
  /// The LLM backend could not be reached.
  LlmUnavailable(anyhow::Error),
  /// The LLM call exceeded its configured timeout.
  LlmTimeout,
  /// A tool call (or fallback JSON block) did not parse into the expected shape.
  MalformedToolArguments(String),
  /// The embedding call failed for a fact being added or updated.
  EmbeddingFailed(anyhow::Error),
  /// The storage backend could not be reached for a whole batch.
  StorageUnavailable(anyhow::Error),
  /// One or more rows in a `StoreBatch` call failed; the rest were written.
  BatchPartialFailure(Vec<(usize, String)>),
  /// An UPDATE/DELETE target id does not exist, or does not belong to the candidate set.
  NotFound(Uuid),
  /// The filter could not be evaluated by the backend (e.g. `min > max` on a range).
  InvalidFilter(String),
  /// The schema could not be brought up to date.
  SchemaMismatch(String),
  /// The caller's cancellation token fired.
  Cancelled,
}

impl fmt::Display for EngineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::InputInvalid(msg) => write!(f, "invalid input document: {msg}"),
      Self::LlmUnavailable(err) => write!(f, "llm unavailable: {err}"),
      Self::LlmTimeout => write!(f, "llm call timed out"),
      Self::MalformedToolArguments(msg) => write!(f, "malformed tool arguments: {msg}"),
      Self::EmbeddingFailed(err) => write!(f, "embedding failed: {err}"),
      Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
      Self::BatchPartialFailure(rows) => {
        write!(f, "batch partial failure ({} rows): ", rows.len())?;
        for (idx, msg) in rows {
          write!(f, "[{idx}] {msg}; ")?;
        }
        Ok(())
      }
      Self::NotFound(id) => write!(f, "fact {id} not found"),
      Self::InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
      Self::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
      Self::Cancelled => write!(f, "cancelled"),
    }
  }
}

impl std::error::Error for EngineError {}

impl From<EngineError> for AppError {
  fn from(err: EngineError) -> Self {
    use axum::http::StatusCode;

    let status = match &err {
      EngineError::NotFound(_) => StatusCode::NOT_FOUND,
      EngineError::InputInvalid(_) | EngineError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
      EngineError::Cancelled => StatusCode::REQUEST_TIMEOUT,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    Self::with_status(status, anyhow::anyhow!(err.to_string()))
  }
}
