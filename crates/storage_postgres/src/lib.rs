//! The Postgres reference implementation of `StorageBackend`, built on
//! `sea-orm` entities for the typed CRUD paths and raw `Statement`s for the
//! vector-distance query (mirroring the teacher's own `episodic.rs`
//! `embedding <=> $n` idiom). `pgvector`'s HNSW index (`vector_cosine_ops`)
//! backs the similarity search; every other filter leg is a plain SQL
//! predicate built up positionally.

use async_trait::async_trait;
use chrono::Utc;
use plastmem_core::document::DocumentLike;
use plastmem_core::error::EngineError;
use plastmem_core::fact::{Fact, Importance, Sensitivity};
use plastmem_core::filter::{BoolOp, Filter, TagExpr, TagFilter};
use plastmem_core::storage::{
  DocumentChunk, DocumentReference, QueryResult, StorageBackend, StoredDocument,
};
use plastmem_core::Document;
use plastmem_entities::{document_chunk, fact, stored_document};
use sea_orm::prelude::PgVector;
use sea_orm::sea_query::{ArrayType, Value as SeaValue};
use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
  FromQueryResult, QueryFilter, Set, Statement,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// When a distance cutoff is set, how many candidates to pull before
/// truncating to `limit` — wide enough that evaluating more would not
/// change the returned set for any reasonably sized memory store. An
/// implementation detail of this backend, not part of the storage
/// contract (see `SPEC_FULL.md` §9's open question on the widening factor).
const CANDIDATE_WIDENING_FACTOR: i64 = 1000;

/// `sea-orm`-backed implementation of `StorageBackend`.
#[derive(Clone)]
pub struct PostgresBackend {
  db: DatabaseConnection,
}

impl PostgresBackend {
  #[must_use]
  pub const fn new(db: DatabaseConnection) -> Self {
    Self { db }
  }
}

fn content_hash(content: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(content.as_bytes());
  format!("{:x}", hasher.finalize())
}

fn storage_err(err: impl std::fmt::Display) -> EngineError {
  EngineError::StorageUnavailable(anyhow::anyhow!(err.to_string()))
}

/// Reads a string key out of `metadata_json`, for rows that predate a
/// structured column and only ever recorded the value under its legacy key.
fn metadata_str(metadata: &serde_json::Value, key: &str) -> Option<String> {
  metadata.get(key).and_then(|v| v.as_str()).map(str::to_owned)
}

/// Direct column wins when non-empty; falls back to the legacy
/// `metadata_json` key otherwise (see `m20260301_02_create_facts_table`'s
/// `metadata_json` column comment).
fn field_or_fallback(direct: String, metadata: &serde_json::Value, key: &str) -> String {
  if direct.is_empty() {
    metadata_str(metadata, key).unwrap_or(direct)
  } else {
    direct
  }
}

fn optional_field_or_fallback(
  direct: Option<String>,
  metadata: &serde_json::Value,
  key: &str,
) -> Option<String> {
  direct.or_else(|| metadata_str(metadata, key))
}

/// `importance` is `NOT NULL DEFAULT 0`, which no write ever produces
/// (`Importance::as_i16` only emits `1..=3`) — `0` is therefore an
/// unambiguous "never set directly" sentinel, unlike `1` would be.
fn importance_or_fallback(direct: i16, metadata: &serde_json::Value) -> Importance {
  if direct == 0 {
    let fallback = metadata
      .get("factImportance")
      .and_then(serde_json::Value::as_i64)
      .map_or(0, |v| v as i16);
    Importance::from_i16(fallback)
  } else {
    Importance::from_i16(direct)
  }
}

fn fact_from_model(model: fact::Model) -> Fact {
  let metadata_json = model.metadata_json;
  let category = field_or_fallback(model.category, &metadata_json, "factCategory");
  let subject = field_or_fallback(model.subject, &metadata_json, "factSubject");
  let attribute = field_or_fallback(model.attribute, &metadata_json, "factAttribute");
  let value = field_or_fallback(model.value, &metadata_json, "factValue");
  let temporal_context =
    optional_field_or_fallback(model.temporal_context, &metadata_json, "factTemporalContext");
  let sensitivity = field_or_fallback(model.sensitivity, &metadata_json, "factSensitivity")
    .parse()
    .unwrap_or(Sensitivity::Low);
  let importance = importance_or_fallback(model.importance, &metadata_json);
  let file_path = optional_field_or_fallback(model.file_path, &metadata_json, "factFilePath");

  Fact {
    id: model.id,
    content: model.content,
    timestamp: model.timestamp,
    source: model.source,
    tags: model.tags,
    document_references: model.document_references,
    metadata: metadata_json
      .as_object()
      .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
      .unwrap_or_default(),
    category,
    subject,
    attribute,
    value,
    temporal_context,
    sensitivity,
    importance,
    file_path,
    vector: model.vector.to_vec(),
  }
}

fn fact_to_active_model(fact: &Fact) -> fact::ActiveModel {
  let metadata_json: serde_json::Value =
    serde_json::Value::Object(fact.metadata.clone().into_iter().collect());

  fact::ActiveModel {
    id: Set(fact.id),
    content: Set(fact.content.clone()),
    timestamp: Set(fact.timestamp),
    source: Set(fact.source.clone()),
    tags: Set(fact.tags.clone()),
    document_references: Set(fact.document_references.clone()),
    metadata_json: Set(metadata_json),
    category: Set(fact.category.clone()),
    subject: Set(fact.subject.clone()),
    attribute: Set(fact.attribute.clone()),
    value: Set(fact.value.clone()),
    temporal_context: Set(fact.temporal_context.clone()),
    sensitivity: Set(fact.sensitivity.as_str().to_owned()),
    importance: Set(fact.importance.as_i16()),
    file_path: Set(fact.file_path.clone()),
    vector: Set(PgVector::from(fact.vector.clone())),
    created_at: Set(Utc::now()),
  }
}

fn stored_document_from_model(model: stored_document::Model) -> StoredDocument {
  StoredDocument {
    id: model.id,
    content: model.content,
    content_hash: model.content_hash,
    doc_type: model.doc_type,
    original_id: model.original_id,
    metadata: model
      .metadata
      .as_object()
      .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
      .unwrap_or_default(),
    created_at: model.created_at,
  }
}

fn document_chunk_from_model(model: document_chunk::Model) -> DocumentChunk {
  DocumentChunk {
    id: model.id,
    content: model.content,
    vector: model.vector.to_vec(),
    chunk_index: model.chunk_index,
    original_document_id: model.original_document_id,
    source: model.source,
    file_path: model.file_path,
    tags: model.tags,
    metadata: model
      .metadata
      .as_object()
      .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
      .unwrap_or_default(),
    created_at: model.created_at,
  }
}

/// Expand a `TagFilter` into a union of conjunctions: an `OR` of `AND`
/// groups, each group a set of tags that must *all* be present. Leaves of
/// `Any` expand into one singleton group per tag; `Branch{And, ..}` takes
/// the cross product of its children's groups. Backends that cannot
/// express this as a single predicate would issue one query per group and
/// merge; Postgres expresses the whole union as one `OR`-of-`@>` predicate.
fn tag_filter_to_dnf(filter: &TagFilter) -> Vec<Vec<String>> {
  match filter {
    TagFilter::All(tags) => vec![tags.clone()],
    TagFilter::Any(tags) => tags.iter().map(|t| vec![t.clone()]).collect(),
    TagFilter::Expr(expr) => tag_expr_to_dnf(expr),
  }
}

fn tag_expr_to_dnf(expr: &TagExpr) -> Vec<Vec<String>> {
  match expr {
    TagExpr::Leaf { op: BoolOp::And, tags } => vec![tags.clone()],
    TagExpr::Leaf { op: BoolOp::Or, tags } => tags.iter().map(|t| vec![t.clone()]).collect(),
    TagExpr::Branch { op: BoolOp::Or, children } => {
      children.iter().flat_map(tag_expr_to_dnf).collect()
    }
    TagExpr::Branch { op: BoolOp::And, children } => {
      children.iter().map(tag_expr_to_dnf).fold(vec![Vec::new()], |acc, groups| {
        acc
          .iter()
          .flat_map(|prefix| {
            groups.iter().map(move |group| {
              let mut combined = prefix.clone();
              combined.extend(group.iter().cloned());
              combined
            })
          })
          .collect()
      })
    }
  }
}

/// Build the `WHERE` clause and its positional parameters for `query`.
/// `$1` is always the query vector; subsequent params are appended in the
/// order conditions are added.
fn build_query_conditions(filter: &Filter, vector: &[f32]) -> (Vec<String>, Vec<SeaValue>) {
  let mut conditions = Vec::new();
  let mut params: Vec<SeaValue> = vec![PgVector::from(vector.to_vec()).into()];

  let mut push = |cond: String, value: SeaValue| {
    params.push(value);
    conditions.push(cond.replace("$$", &format!("${}", params.len())));
  };

  if let Some(source) = &filter.source {
    push("source = $$".to_owned(), source.clone().into());
  }
  if let Some(subject) = &filter.subject {
    push("subject = $$".to_owned(), subject.clone().into());
  }
  if let Some(category) = &filter.fact_category {
    push("category = $$".to_owned(), category.clone().into());
  }
  if let Some(attribute) = &filter.fact_attribute {
    push("attribute = $$".to_owned(), attribute.clone().into());
  }
  if let Some(file_path) = &filter.fact_file_path {
    push("file_path = $$".to_owned(), file_path.clone().into());
  }
  if let Some(importance) = filter.fact_importance {
    push("importance = $$".to_owned(), importance.into());
  }
  if let Some(min) = filter.fact_importance_min {
    push("importance >= $$".to_owned(), min.into());
  }
  if let Some(max) = filter.fact_importance_max {
    push("importance <= $$".to_owned(), max.into());
  }
  if let Some(after) = filter.timestamp_after {
    push("\"timestamp\" > $$".to_owned(), after.into());
  }
  if let Some(before) = filter.timestamp_before {
    push("\"timestamp\" < $$".to_owned(), before.into());
  }
  if let Some(doc_ref) = filter.document_references {
    push(
      "document_references @> $$::uuid[]".to_owned(),
      SeaValue::Array(ArrayType::Uuid, Some(Box::new(vec![doc_ref.into()]))),
    );
  }
  if let Some(tag_filter) = &filter.tags {
    let groups = tag_filter_to_dnf(tag_filter);
    let mut group_conditions = Vec::with_capacity(groups.len());
    for group in groups {
      let placeholder_idx = params.len() + 1;
      params.push(SeaValue::Array(
        ArrayType::String,
        Some(Box::new(group.into_iter().map(Into::into).collect())),
      ));
      group_conditions.push(format!("tags @> ${placeholder_idx}::text[]"));
    }
    if !group_conditions.is_empty() {
      conditions.push(format!("({})", group_conditions.join(" OR ")));
    }
  }

  (conditions, params)
}

#[async_trait]
impl StorageBackend for PostgresBackend {
  /// Defensive, idempotent schema bring-up: callers that skip the
  /// `plastmem_migration` binary (tests, ad-hoc scripts) still get a usable
  /// schema. Mirrors the migration crate's own `ADD COLUMN IF NOT EXISTS` /
  /// `CREATE INDEX IF NOT EXISTS` idiom rather than duplicating table
  /// creation — this only adds columns a pre-existing, older table might be
  /// missing.
  async fn ensure_schema(&self) -> Result<(), EngineError> {
    let backend = self.db.get_database_backend();
    let statements = [
      "ALTER TABLE IF EXISTS facts \
       ADD COLUMN IF NOT EXISTS source TEXT NOT NULL DEFAULT '', \
       ADD COLUMN IF NOT EXISTS subject TEXT NOT NULL DEFAULT '', \
       ADD COLUMN IF NOT EXISTS category TEXT NOT NULL DEFAULT '', \
       ADD COLUMN IF NOT EXISTS attribute TEXT NOT NULL DEFAULT '', \
       ADD COLUMN IF NOT EXISTS value TEXT NOT NULL DEFAULT '', \
       ADD COLUMN IF NOT EXISTS sensitivity TEXT NOT NULL DEFAULT '', \
       ADD COLUMN IF NOT EXISTS importance SMALLINT NOT NULL DEFAULT 0, \
       ADD COLUMN IF NOT EXISTS temporal_context TEXT, \
       ADD COLUMN IF NOT EXISTS file_path TEXT, \
       ADD COLUMN IF NOT EXISTS tags TEXT[] NOT NULL DEFAULT '{}', \
       ADD COLUMN IF NOT EXISTS document_references UUID[] NOT NULL DEFAULT '{}', \
       ADD COLUMN IF NOT EXISTS metadata_json JSONB NOT NULL DEFAULT '{}';",
      "CREATE INDEX IF NOT EXISTS idx_facts_embedding ON facts USING hnsw (vector vector_cosine_ops);",
      "CREATE INDEX IF NOT EXISTS idx_facts_subject ON facts (subject);",
    ];
    for sql in statements {
      self
        .db
        .execute_raw(Statement::from_string(backend, sql))
        .await
        .map_err(storage_err)?;
    }
    Ok(())
  }

  async fn upsert_document(&self, doc: &Document) -> Result<Uuid, EngineError> {
    let content = doc.content();
    let hash = content_hash(&content);

    if let Some(existing) = stored_document::Entity::find()
      .filter(stored_document::Column::ContentHash.eq(hash.clone()))
      .one(&self.db)
      .await
      .map_err(storage_err)?
    {
      return Ok(existing.id);
    }

    let doc_type = match doc {
      Document::Text(_) => "text",
      Document::Conversation(_) => "conversation",
      Document::File(_) => "file",
    };
    let metadata: serde_json::Value =
      serde_json::Value::Object(doc.metadata().clone().into_iter().collect());
    let id = Uuid::new_v4();

    let active = stored_document::ActiveModel {
      id: Set(id),
      content: Set(content),
      content_hash: Set(hash),
      doc_type: Set(doc_type.to_owned()),
      original_id: Set(doc.id().to_string()),
      metadata: Set(metadata),
      created_at: Set(Utc::now()),
    };

    match active.insert(&self.db).await {
      Ok(model) => Ok(model.id),
      // A concurrent insert of the same content beat us to it; read back
      // the row it created rather than treating this as a failure.
      Err(_) => stored_document::Entity::find()
        .filter(stored_document::Column::ContentHash.eq(content_hash(&doc.content())))
        .one(&self.db)
        .await
        .map_err(storage_err)?
        .map(|m| m.id)
        .ok_or_else(|| storage_err("upsert_document: insert failed and no row to read back")),
    }
  }

  async fn get_stored_document(&self, id: Uuid) -> Result<StoredDocument, EngineError> {
    stored_document::Entity::find_by_id(id)
      .one(&self.db)
      .await
      .map_err(storage_err)?
      .map(stored_document_from_model)
      .ok_or(EngineError::NotFound(id))
  }

  async fn get_stored_documents_batch(
    &self,
    ids: &[Uuid],
  ) -> Result<Vec<StoredDocument>, EngineError> {
    let models = stored_document::Entity::find()
      .filter(stored_document::Column::Id.is_in(ids.to_vec()))
      .all(&self.db)
      .await
      .map_err(storage_err)?;
    Ok(models.into_iter().map(stored_document_from_model).collect())
  }

  async fn store_batch(&self, facts: &[Fact]) -> Result<(), EngineError> {
    let mut row_errors = Vec::new();
    for (idx, fact) in facts.iter().enumerate() {
      if let Err(err) = fact_to_active_model(fact).insert(&self.db).await {
        row_errors.push((idx, err.to_string()));
      }
    }
    if row_errors.is_empty() {
      Ok(())
    } else {
      Err(EngineError::BatchPartialFailure(row_errors))
    }
  }

  async fn query(
    &self,
    _text: &str,
    vector: &[f32],
    filter: &Filter,
  ) -> Result<QueryResult, EngineError> {
    if filter.importance_range_is_empty() {
      return Ok(QueryResult::default());
    }
    let limit = filter.resolved_limit();
    if limit == 0 {
      return Ok(QueryResult::default());
    }

    let (conditions, params) = build_query_conditions(filter, vector);
    let widen = filter.distance.is_some_and(|d| d > 0.0);
    let candidate_limit = if widen {
      limit.max(CANDIDATE_WIDENING_FACTOR)
    } else {
      limit
    };

    let where_clause = if conditions.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
      "SELECT id, content, \"timestamp\", source, tags, document_references, metadata_json, \
       category, subject, attribute, value, temporal_context, sensitivity, importance, \
       file_path, vector, created_at FROM facts {where_clause} \
       ORDER BY vector <=> $1 LIMIT {candidate_limit}"
    );

    let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, params);
    let rows = self.db.query_all_raw(stmt).await.map_err(storage_err)?;

    let mut facts = Vec::with_capacity(rows.len());
    for row in rows {
      let model = fact::Model::from_query_result(&row, "").map_err(storage_err)?;
      let fact = fact_from_model(model);
      if let Some(max_distance) = filter.distance.filter(|d| *d > 0.0) {
        let cosine_distance = 1.0 - plastmem_ai::cosine_similarity(vector, &fact.vector);
        if cosine_distance > max_distance {
          continue;
        }
      }
      facts.push(fact);
    }
    facts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

    let chunk_models = document_chunk::Entity::find().all(&self.db).await.map_err(storage_err)?;
    let mut chunks: Vec<DocumentChunk> = chunk_models
      .into_iter()
      .map(document_chunk_from_model)
      .filter(|c| filter.source.as_deref().is_none_or(|s| s == c.source))
      .collect();
    chunks.sort_by(|a, b| {
      plastmem_ai::cosine_similarity(vector, &b.vector)
        .total_cmp(&plastmem_ai::cosine_similarity(vector, &a.vector))
    });

    Ok(QueryResult {
      facts,
      document_chunks: chunks,
    })
  }

  async fn get_by_id(&self, id: Uuid) -> Result<Option<Fact>, EngineError> {
    Ok(
      fact::Entity::find_by_id(id)
        .one(&self.db)
        .await
        .map_err(storage_err)?
        .map(fact_from_model),
    )
  }

  async fn get_facts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Fact>, EngineError> {
    let models = fact::Entity::find()
      .filter(fact::Column::Id.is_in(ids.to_vec()))
      .all(&self.db)
      .await
      .map_err(storage_err)?;
    Ok(models.into_iter().map(fact_from_model).collect())
  }

  async fn update(&self, id: Uuid, content: &str, vector: &[f32]) -> Result<(), EngineError> {
    let model = fact::Entity::find_by_id(id)
      .one(&self.db)
      .await
      .map_err(storage_err)?
      .ok_or(EngineError::NotFound(id))?;

    let mut active: fact::ActiveModel = model.into();
    active.content = Set(content.to_owned());
    active.vector = Set(PgVector::from(vector.to_vec()));
    active.update(&self.db).await.map_err(storage_err)?;
    Ok(())
  }

  async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
    fact::Entity::delete_by_id(id)
      .exec(&self.db)
      .await
      .map_err(storage_err)?;
    Ok(())
  }

  async fn delete_all(&self) -> Result<(), EngineError> {
    fact::Entity::delete_many().exec(&self.db).await.map_err(storage_err)?;
    stored_document::Entity::delete_many().exec(&self.db).await.map_err(storage_err)?;
    document_chunk::Entity::delete_many().exec(&self.db).await.map_err(storage_err)?;
    Ok(())
  }

  async fn get_document_references(
    &self,
    fact_id: Uuid,
  ) -> Result<Vec<DocumentReference>, EngineError> {
    let fact = fact::Entity::find_by_id(fact_id)
      .one(&self.db)
      .await
      .map_err(storage_err)?
      .ok_or(EngineError::NotFound(fact_id))?;

    let docs = stored_document::Entity::find()
      .filter(stored_document::Column::Id.is_in(fact.document_references))
      .all(&self.db)
      .await
      .map_err(storage_err)?;

    Ok(
      docs
        .into_iter()
        .map(|d| DocumentReference {
          id: d.id,
          content: d.content,
          doc_type: d.doc_type,
        })
        .collect(),
    )
  }
}
