use std::time::Duration;

use plastmem_shared::AppConfig;

/// The engine's own view of the tunables, decoupled from `plastmem_shared`'s
/// process-wide singleton so tests can construct arbitrary configurations
/// without touching the environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
  pub workers: usize,
  pub facts_per_worker: usize,
  pub batch_size: usize,
  pub flush_interval: Duration,

  pub fact_extraction_timeout: Duration,
  pub memory_decision_timeout: Duration,
  pub storage_timeout: Duration,

  pub enable_rich_context: bool,
  pub parallel_fact_extraction: bool,
  pub streaming_progress: bool,

  pub max_document_chars: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      workers: 4,
      facts_per_worker: 50,
      batch_size: 100,
      flush_interval: Duration::from_secs(30),

      fact_extraction_timeout: Duration::from_secs(1200),
      memory_decision_timeout: Duration::from_secs(1200),
      storage_timeout: Duration::from_secs(1200),

      enable_rich_context: true,
      parallel_fact_extraction: true,
      streaming_progress: true,

      max_document_chars: 20_000,
    }
  }
}

impl From<&AppConfig> for EngineConfig {
  fn from(cfg: &AppConfig) -> Self {
    Self {
      workers: cfg.workers,
      facts_per_worker: cfg.facts_per_worker,
      batch_size: cfg.batch_size,
      flush_interval: cfg.flush_interval,

      fact_extraction_timeout: cfg.fact_extraction_timeout,
      memory_decision_timeout: cfg.memory_decision_timeout,
      storage_timeout: cfg.storage_timeout,

      enable_rich_context: cfg.enable_rich_context,
      parallel_fact_extraction: cfg.parallel_fact_extraction,
      streaming_progress: cfg.streaming_progress,

      max_document_chars: cfg.max_document_chars,
    }
  }
}
