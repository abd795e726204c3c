mod consolidation;
pub use consolidation::*;

mod ingest;
pub use ingest::*;

use plastmem_shared::AppError;

/// Error type for the apalis job boundary. Jobs internally use `AppError`;
/// this wrapper converts at the worker boundary the same way the teacher's
/// own `jobs::WorkerError` does.
#[derive(Debug)]
pub struct WorkerError(pub AppError);

impl std::fmt::Display for WorkerError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

impl std::error::Error for WorkerError {}

impl From<AppError> for WorkerError {
  fn from(err: AppError) -> Self {
    Self(err)
  }
}

impl From<anyhow::Error> for WorkerError {
  fn from(err: anyhow::Error) -> Self {
    Self(AppError::new(err))
  }
}

impl From<plastmem_core::EngineError> for WorkerError {
  fn from(err: plastmem_core::EngineError) -> Self {
    Self(AppError::new(anyhow::anyhow!(err.to_string())))
  }
}
