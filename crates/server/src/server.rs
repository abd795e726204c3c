use apalis_postgres::PostgresStorage;
use axum::{Router, response::Html, routing::get};
use plastmem_core::Engine;
use plastmem_shared::AppError;
use plastmem_storage_postgres::PostgresBackend;
use plastmem_worker::{ConsolidationJob, IngestDocumentsJob};
use tokio::net::TcpListener;

use crate::{
  api,
  utils::{AppState, shutdown_signal},
};

#[axum::debug_handler]
async fn handler() -> Html<&'static str> {
  Html("<h1>Plast Mem</h1>")
}

pub async fn server(
  engine: Engine<PostgresBackend>,
  ingest_job_storage: PostgresStorage<IngestDocumentsJob>,
  consolidation_job_storage: PostgresStorage<ConsolidationJob>,
) -> Result<(), AppError> {
  let app_state = AppState::new(engine, ingest_job_storage, consolidation_job_storage);

  let app = Router::new()
    .route("/", get(handler))
    .merge(api::app())
    .with_state(app_state);

  let listener = TcpListener::bind("0.0.0.0:3000").await?;

  tracing::info!("server started at http://0.0.0.0:3000");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}
