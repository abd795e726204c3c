use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::prelude::PgVector;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// A stored, embedded fact row. Structured fields (`subject`, `attribute`,
/// `value`, ...) are first-class columns written on every save; `metadata_json`
/// carries the free-form `source_fact_<n>`-style provenance keys a
/// consolidated fact records (see `plastmem_core::fact::SOURCE_FACT_METADATA_PREFIX`)
/// and also serves as the read-time fallback for rows predating one of the
/// structured columns — `fact_from_model` consults it under the
/// `factCategory`/`factSubject`/`factAttribute`/`factValue`/`factSensitivity`/
/// `factImportance`/`factTemporalContext`/`factFilePath` keys whenever the
/// direct column is empty.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "facts")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub content: String,
  pub timestamp: DateTime<Utc>,
  pub source: String,
  #[sea_orm(column_type = "custom(\"TEXT[]\")")]
  pub tags: Vec<String>,
  #[sea_orm(column_type = "custom(\"UUID[]\")")]
  pub document_references: Vec<Uuid>,
  #[sea_orm(column_type = "JsonBinary")]
  pub metadata_json: Json,
  pub category: String,
  pub subject: String,
  pub attribute: String,
  pub value: String,
  pub temporal_context: Option<String>,
  pub sensitivity: String,
  pub importance: i16,
  pub file_path: Option<String>,
  #[serde(skip)]
  pub vector: PgVector,
  pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
