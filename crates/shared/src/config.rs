use std::env;
use std::sync::LazyLock;
use std::time::Duration;

fn required_env(key: &str) -> String {
  env::var(key).unwrap_or_else(|_| panic!("env {key} must be set"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
  env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

/// Process-wide configuration, loaded once from the environment.
///
/// LLM connection fields are required (no sane default); every engine tunable
/// falls back to the documented default when unset.
pub struct AppConfig {
  pub database_url: String,
  pub openai_base_url: String,
  pub openai_api_key: String,
  pub openai_chat_model: String,
  pub openai_embedding_model: String,

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

impl AppConfig {
  fn new() -> Self {
    dotenvy::dotenv().ok();

    Self {
      database_url: required_env("DATABASE_URL"),
      openai_base_url: required_env("OPENAI_BASE_URL"),
      openai_api_key: required_env("OPENAI_API_KEY"),
      openai_chat_model: required_env("OPENAI_CHAT_MODEL"),
      openai_embedding_model: required_env("OPENAI_EMBEDDING_MODEL"),

      workers: env_or("ENGINE_WORKERS", 4),
      facts_per_worker: env_or("ENGINE_FACTS_PER_WORKER", 50),
      batch_size: env_or("ENGINE_BATCH_SIZE", 100),
      flush_interval: Duration::from_secs(env_or("ENGINE_FLUSH_INTERVAL_SECS", 30)),

      fact_extraction_timeout: Duration::from_secs(env_or(
        "ENGINE_FACT_EXTRACTION_TIMEOUT_SECS",
        1200,
      )),
      memory_decision_timeout: Duration::from_secs(env_or(
        "ENGINE_MEMORY_DECISION_TIMEOUT_SECS",
        1200,
      )),
      storage_timeout: Duration::from_secs(env_or("ENGINE_STORAGE_TIMEOUT_SECS", 1200)),

      enable_rich_context: env_or("ENGINE_ENABLE_RICH_CONTEXT", true),
      parallel_fact_extraction: env_or("ENGINE_PARALLEL_FACT_EXTRACTION", true),
      streaming_progress: env_or("ENGINE_STREAMING_PROGRESS", true),

      max_document_chars: env_or("ENGINE_MAX_DOCUMENT_CHARS", 20_000),
    }
  }
}

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(AppConfig::new);
