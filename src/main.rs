use std::sync::Arc;

use apalis_postgres::PostgresStorage;
use plastmem_core::{Engine, EngineConfig, OpenAiClient, StorageBackend};
use plastmem_migration::{Migrator, MigratorTrait};
use plastmem_server::server;
use plastmem_shared::{APP_CONFIG, AppError};
use plastmem_storage_postgres::PostgresBackend;
use plastmem_worker::{ConsolidationJob, IngestDocumentsJob, worker};
use sea_orm::Database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let db = Database::connect(APP_CONFIG.database_url.as_str()).await?;

  // Apply all pending migrations
  // https://www.sea-ql.org/SeaORM/docs/migration/running-migration/#migrating-programmatically
  Migrator::up(&db, None).await?;

  let storage = Arc::new(PostgresBackend::new(db.clone()));
  storage.ensure_schema().await?;
  let engine = Engine::new(
    storage,
    Arc::new(OpenAiClient),
    Arc::new(OpenAiClient),
    EngineConfig::from(&*APP_CONFIG),
  );

  PostgresStorage::setup(&db.get_postgres_connection_pool()).await?;
  let ingest_job_storage = PostgresStorage::<IngestDocumentsJob>::new(db.get_postgres_connection_pool());
  let consolidation_job_storage =
    PostgresStorage::<ConsolidationJob>::new(db.get_postgres_connection_pool());

  let _ = tokio::try_join!(
    worker(
      engine.clone(),
      ingest_job_storage.clone(),
      consolidation_job_storage.clone()
    ),
    server(engine, ingest_job_storage, consolidation_job_storage)
  );

  Ok(())
}
