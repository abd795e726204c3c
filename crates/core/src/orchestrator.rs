//! The concurrent ingest pipeline: prepare -> distribute -> extract -> decide
//! -> batch-write. Stages are independent `tokio` tasks connected by bounded
//! channels; the decision engine (dominated by LLM latency) is the natural
//! throttle, so no separate backpressure mechanism is needed beyond the
//! channels' own bounded capacity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::consolidator::CANONICAL_SUBJECTS;
use crate::decision::{self, Decision};
use crate::document::{chunk, file_document_facts, Document, DocumentLike, FileDocument};
use crate::error::EngineError;
use crate::extractor;
use crate::fact::Fact;
use crate::llm::{EmbeddingClient, ToolCallingClient};
use crate::storage::StorageBackend;

/// One `(processed, total)` update, reported in monotonically
/// non-decreasing order from a single task.
#[derive(Debug, Clone)]
pub struct Progress {
  pub processed: usize,
  pub total: usize,
  pub stage: &'static str,
}

/// Tracks how many outstanding facts remain per prepared document, so the
/// writer and decision workers can tell exactly when a document's full
/// search -> decide -> execute chain has completed, independent of how many
/// facts it produced or how they were batched.
struct Completion {
  remaining: Mutex<HashMap<usize, usize>>,
  processed: AtomicUsize,
  total: usize,
  progress_tx: mpsc::Sender<Progress>,
}

impl Completion {
  fn new(total: usize, progress_tx: mpsc::Sender<Progress>) -> Self {
    Self {
      remaining: Mutex::new(HashMap::new()),
      processed: AtomicUsize::new(0),
      total,
      progress_tx,
    }
  }

  async fn register(&self, doc_idx: usize, fact_count: usize) {
    if fact_count == 0 {
      self.complete_one().await;
    } else {
      self.remaining.lock().unwrap().insert(doc_idx, fact_count);
    }
  }

  async fn fact_done(&self, doc_idx: usize) {
    let done = {
      let mut remaining = self.remaining.lock().unwrap();
      match remaining.get_mut(&doc_idx) {
        Some(count) => {
          *count -= 1;
          let done = *count == 0;
          if done {
            remaining.remove(&doc_idx);
          }
          done
        }
        None => false,
      }
    };
    if done {
      self.complete_one().await;
    }
  }

  async fn complete_one(&self) {
    let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
    let _ = self
      .progress_tx
      .send(Progress {
        processed,
        total: self.total,
        stage: "storage",
      })
      .await;
  }
}

/// A fact in flight, tagged with the index of the prepared document it came
/// from (for completion tracking) and the document it should be attributed
/// to on ADD (for `upsert_document`).
struct FactUnit {
  doc_idx: usize,
  document: Arc<Document>,
  fact: Fact,
}

/// Split each input document into one or more extraction-sized units.
/// `Document::File` is returned unsplit — it bypasses extraction entirely.
fn prepare(doc: Document, max_chars: usize) -> Vec<Document> {
  if matches!(doc, Document::File(_)) {
    return vec![doc];
  }

  let content = doc.content();
  if max_chars == 0 || content.chars().count() <= max_chars {
    return vec![doc];
  }

  let original_id = doc.id();
  let base_metadata = doc.metadata().clone();
  let source = doc.source().to_owned();
  let tags = doc.tags().to_vec();
  let file_path = doc.file_path().map(str::to_owned);
  let timestamp = doc.timestamp();

  chunk(&content, original_id, "text", &base_metadata, max_chars)
    .into_iter()
    .map(|piece| {
      Document::Text(crate::document::TextDocument {
        id: Uuid::new_v4(),
        text: piece.content,
        timestamp,
        source: source.clone(),
        tags: tags.clone(),
        metadata: piece.metadata,
        file_path: file_path.clone(),
      })
    })
    .collect()
}

#[allow(clippy::too_many_arguments)]
pub fn store_streaming<S>(
  storage: Arc<S>,
  llm: Arc<dyn ToolCallingClient>,
  embedder: Arc<dyn EmbeddingClient>,
  config: EngineConfig,
  docs: Vec<Document>,
  cancel: CancellationToken,
) -> (mpsc::Receiver<Progress>, mpsc::Receiver<EngineError>)
where
  S: StorageBackend + 'static,
{
  let (progress_tx, progress_rx) = mpsc::channel(1024);
  let (error_tx, error_rx) = mpsc::channel(1024);

  tokio::spawn(run_pipeline(
    storage,
    llm,
    embedder,
    config,
    docs,
    cancel,
    progress_tx,
    error_tx,
  ));

  (progress_rx, error_rx)
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline<S>(
  storage: Arc<S>,
  llm: Arc<dyn ToolCallingClient>,
  embedder: Arc<dyn EmbeddingClient>,
  config: EngineConfig,
  docs: Vec<Document>,
  cancel: CancellationToken,
  progress_tx: mpsc::Sender<Progress>,
  error_tx: mpsc::Sender<EngineError>,
) where
  S: StorageBackend + 'static,
{
  let has_file_route = docs.iter().any(|d| matches!(d, Document::File(_)));

  let prepared: Vec<Document> = docs
    .into_iter()
    .flat_map(|d| prepare(d, config.max_document_chars))
    .collect();

  let total = prepared.len();
  let completion = Arc::new(Completion::new(total, progress_tx.clone()));

  let (fact_tx, fact_rx) = mpsc::channel::<FactUnit>(1000);
  let fact_rx = Arc::new(tokio::sync::Mutex::new(fact_rx));
  let (add_tx, add_rx) = mpsc::channel::<(usize, Fact)>(1000);

  // Extract stage: round-robin prepared documents across `workers` tasks.
  // `Document::File` bypasses the LLM and the decision stage entirely —
  // its chunks go straight to the writer as pre-made facts.
  let mut extract_tasks = tokio::task::JoinSet::new();
  let buckets = distribute(prepared, config.workers);
  for bucket in buckets {
    let llm = llm.clone();
    let storage = storage.clone();
    let embedder = embedder.clone();
    let fact_tx = fact_tx.clone();
    let add_tx = add_tx.clone();
    let completion = completion.clone();
    let error_tx = error_tx.clone();
    let cancel = cancel.clone();
    let timeout = config.fact_extraction_timeout;
    let storage_timeout = config.storage_timeout;
    let max_chars = config.max_document_chars;

    extract_tasks.spawn(async move {
      for (doc_idx, doc) in bucket {
        if cancel.is_cancelled() {
          break;
        }

        if let Document::File(file_doc) = &doc {
          let result = run_cancellable(
            &cancel,
            storage_timeout,
            || EngineError::StorageUnavailable(anyhow::anyhow!("file route timed out")),
            extract_file_route(&storage, &embedder, file_doc, max_chars),
          )
          .await;
          match result {
            Ok(facts) => {
              completion.register(doc_idx, facts.len()).await;
              for fact in facts {
                if !send_cancellable(&cancel, &add_tx, (doc_idx, fact)).await {
                  break;
                }
              }
            }
            Err(EngineError::Cancelled) => {
              let _ = error_tx.send(EngineError::Cancelled).await;
              break;
            }
            Err(err) => {
              let _ = error_tx.send(err).await;
              completion.register(doc_idx, 0).await;
            }
          }
          continue;
        }

        let doc = Arc::new(doc);
        let result = run_cancellable(
          &cancel,
          timeout,
          || EngineError::LlmTimeout,
          extractor::extract_facts(&doc, &llm, Utc::now()),
        )
        .await;

        let facts = match result {
          Ok(facts) => facts,
          Err(EngineError::Cancelled) => {
            let _ = error_tx.send(EngineError::Cancelled).await;
            break;
          }
          Err(err) => {
            let _ = error_tx.send(err).await;
            Vec::new()
          }
        };

        completion.register(doc_idx, facts.len()).await;

        for fact in facts {
          if !send_cancellable(
            &cancel,
            &fact_tx,
            FactUnit {
              doc_idx,
              document: doc.clone(),
              fact,
            },
          )
          .await
          {
            break;
          }
        }
      }
    });
  }
  drop(fact_tx);

  // Decision stage: `workers` tasks sharing one receiver.
  let mut decision_tasks = tokio::task::JoinSet::new();
  for _ in 0..config.workers.max(1) {
    let fact_rx = fact_rx.clone();
    let add_tx = add_tx.clone();
    let storage = storage.clone();
    let llm = llm.clone();
    let embedder = embedder.clone();
    let error_tx = error_tx.clone();
    let completion = completion.clone();
    let cancel = cancel.clone();
    let timeout = config.memory_decision_timeout;

    decision_tasks.spawn(async move {
      loop {
        let unit = {
          let mut rx = fact_rx.lock().await;
          tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            v = rx.recv() => v,
          }
        };
        let Some(unit) = unit else { break };

        let outcome = run_cancellable(
          &cancel,
          timeout,
          || EngineError::LlmTimeout,
          process_fact(&storage, &llm, &embedder, unit.fact, &unit.document),
        )
        .await;

        match outcome {
          Ok(Some(add_fact)) => {
            if !send_cancellable(&cancel, &add_tx, (unit.doc_idx, add_fact)).await {
              break;
            }
          }
          Ok(None) => {
            completion.fact_done(unit.doc_idx).await;
          }
          Err(EngineError::Cancelled) => {
            let _ = error_tx.send(EngineError::Cancelled).await;
            break;
          }
          Err(err) => {
            let _ = error_tx.send(err).await;
            completion.fact_done(unit.doc_idx).await;
          }
        }
      }
    });
  }
  drop(add_tx);

  // Aggregator + writer: batch ADD facts and flush on size or interval.
  let writer = tokio::spawn(run_writer(
    storage.clone(),
    config.batch_size,
    config.flush_interval,
    config.storage_timeout,
    add_rx,
    completion.clone(),
    error_tx.clone(),
    cancel.clone(),
  ));

  while extract_tasks.join_next().await.is_some() {}
  while decision_tasks.join_next().await.is_some() {}
  let _ = writer.await;

  if has_file_route {
    let consolidate_result = crate::consolidator::run_consolidation(
      storage.as_ref(),
      llm.as_ref(),
      embedder.as_ref(),
      CANONICAL_SUBJECTS,
    )
    .await;
    if let Err(err) = consolidate_result {
      let _ = error_tx.send(err).await;
    }
  }

  // progress_tx and error_tx are dropped here (after the writer finishes),
  // closing progress strictly before error as required.
  drop(progress_tx);
  drop(error_tx);
}

/// The file route: upsert the document once, turn its chunks into pre-made
/// facts, and embed each — no LLM extraction, no decision engine, no
/// candidate search. Facts are handed straight to the writer.
async fn extract_file_route<S>(
  storage: &Arc<S>,
  embedder: &Arc<dyn EmbeddingClient>,
  file_doc: &FileDocument,
  max_chars: usize,
) -> Result<Vec<Fact>, EngineError>
where
  S: StorageBackend + 'static,
{
  let doc = Document::File(file_doc.clone());
  let doc_id = storage.upsert_document(&doc).await?;

  let mut facts = file_document_facts(file_doc, doc_id, max_chars);
  for fact in &mut facts {
    fact.vector = embedder.embed(&fact.content).await?;
  }

  Ok(facts)
}

/// Run one fact through search -> decide -> execute. Returns `Some(fact)`
/// when the decision was ADD (caller forwards it to the aggregator);
/// `None` once UPDATE/DELETE/NONE has been fully executed inline.
async fn process_fact<S>(
  storage: &Arc<S>,
  llm: &Arc<dyn ToolCallingClient>,
  embedder: &Arc<dyn EmbeddingClient>,
  mut fact: Fact,
  document: &Document,
) -> Result<Option<Fact>, EngineError>
where
  S: StorageBackend + 'static,
{
  let vector = embedder.embed(&fact.content).await?;

  let filter = crate::filter::Filter::with_subject(fact.subject.clone());
  let candidates = storage.query(&fact.content, &vector, &filter).await?.facts;

  let decision = decision::decide(&fact, &candidates, llm).await?;

  match decision {
    Decision::Add => {
      let doc_id = storage.upsert_document(document).await?;
      fact.document_references = vec![doc_id];
      fact.vector = vector;
      Ok(Some(fact))
    }
    Decision::Update {
      target_id,
      updated_content,
    } => {
      decision::validate_target(target_id, &candidates)?;
      let new_vector = embedder.embed(&updated_content).await?;
      storage.update(target_id, &updated_content, &new_vector).await?;
      Ok(None)
    }
    Decision::Delete { target_id } => {
      decision::validate_target(target_id, &candidates)?;
      storage.delete(target_id).await?;
      Ok(None)
    }
    Decision::None => Ok(None),
  }
}

#[allow(clippy::too_many_arguments)]
async fn run_writer<S>(
  storage: Arc<S>,
  batch_size: usize,
  flush_interval: std::time::Duration,
  storage_timeout: std::time::Duration,
  mut add_rx: mpsc::Receiver<(usize, Fact)>,
  completion: Arc<Completion>,
  error_tx: mpsc::Sender<EngineError>,
  cancel: CancellationToken,
) where
  S: StorageBackend + 'static,
{
  let mut batch: Vec<(usize, Fact)> = Vec::new();
  let mut ticker = tokio::time::interval(flush_interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  ticker.tick().await; // consume the immediate first tick

  loop {
    tokio::select! {
      biased;
      () = cancel.cancelled() => {
        // The pipeline is tearing down: don't await a blocking write, only
        // take whatever `store_batch` can hand back without waiting for it.
        if !batch.is_empty() {
          let taken = std::mem::take(&mut batch);
          let facts: Vec<Fact> = taken.iter().map(|(_, f)| f.clone()).collect();
          if let Some(result) = storage.store_batch(&facts).now_or_never() {
            report_store_result(result, &taken, &completion, &error_tx).await;
          }
        }
        break;
      }
      item = add_rx.recv() => {
        match item {
          Some(entry) => {
            batch.push(entry);
            if batch.len() >= batch_size.max(1) {
              flush(&storage, &mut batch, storage_timeout, &cancel, &completion, &error_tx).await;
            }
          }
          None => {
            flush(&storage, &mut batch, storage_timeout, &cancel, &completion, &error_tx).await;
            break;
          }
        }
      }
      _ = ticker.tick() => {
        flush(&storage, &mut batch, storage_timeout, &cancel, &completion, &error_tx).await;
      }
    }
  }
}

async fn flush<S>(
  storage: &Arc<S>,
  batch: &mut Vec<(usize, Fact)>,
  storage_timeout: std::time::Duration,
  cancel: &CancellationToken,
  completion: &Arc<Completion>,
  error_tx: &mpsc::Sender<EngineError>,
) where
  S: StorageBackend + 'static,
{
  if batch.is_empty() {
    return;
  }

  let taken = std::mem::take(batch);
  let facts: Vec<Fact> = taken.iter().map(|(_, f)| f.clone()).collect();

  let result = run_cancellable(
    cancel,
    storage_timeout,
    || EngineError::StorageUnavailable(anyhow::anyhow!("store_batch timed out")),
    storage.store_batch(&facts),
  )
  .await;
  report_store_result(result, &taken, completion, error_tx).await;
}

async fn report_store_result(
  result: Result<(), EngineError>,
  taken: &[(usize, Fact)],
  completion: &Arc<Completion>,
  error_tx: &mpsc::Sender<EngineError>,
) {
  match result {
    Ok(()) => {
      for (doc_idx, _) in taken {
        completion.fact_done(*doc_idx).await;
      }
    }
    Err(EngineError::BatchPartialFailure(rows)) => {
      let failed_indices: std::collections::HashSet<usize> =
        rows.iter().map(|(idx, _)| *idx).collect();
      for (idx, msg) in &rows {
        let _ = error_tx
          .send(EngineError::BatchPartialFailure(vec![(*idx, msg.clone())]))
          .await;
      }
      for (row_idx, (doc_idx, _)) in taken.iter().enumerate() {
        if !failed_indices.contains(&row_idx) {
          completion.fact_done(*doc_idx).await;
        }
      }
    }
    Err(err) => {
      let _ = error_tx.send(err).await;
    }
  }
}

/// Races `fut` against `cancel`, and `fut` itself against `timeout`. The
/// in-flight LLM/embedding/storage call each of `fut`'s callers builds is
/// interrupted the instant either one fires, not just checked between
/// iterations of the enclosing loop.
async fn run_cancellable<T, F>(
  cancel: &CancellationToken,
  timeout: std::time::Duration,
  on_timeout: impl FnOnce() -> EngineError,
  fut: F,
) -> Result<T, EngineError>
where
  F: std::future::Future<Output = Result<T, EngineError>>,
{
  tokio::select! {
    res = tokio::time::timeout(timeout, fut) => match res {
      Ok(inner) => inner,
      Err(_) => Err(on_timeout()),
    },
    () = cancel.cancelled() => Err(EngineError::Cancelled),
  }
}

/// Sends on a bounded channel, giving up instead of blocking once `cancel`
/// fires. Returns `false` when the send did not go through, whether because
/// the receiver dropped or because cancellation won the race.
async fn send_cancellable<T>(cancel: &CancellationToken, tx: &mpsc::Sender<T>, item: T) -> bool {
  tokio::select! {
    res = tx.send(item) => res.is_ok(),
    () = cancel.cancelled() => false,
  }
}

/// Round-robin `items` into `n` buckets, preserving each item's original
/// index for completion tracking.
fn distribute(items: Vec<Document>, n: usize) -> Vec<Vec<(usize, Document)>> {
  let n = n.max(1);
  let mut buckets: Vec<Vec<(usize, Document)>> = (0..n).map(|_| Vec::new()).collect();
  for (idx, doc) in items.into_iter().enumerate() {
    buckets[idx % n].push((idx, doc));
  }
  buckets
}
