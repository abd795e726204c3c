use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::prelude::PgVector;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// A single chunk of a `FileDocument`, stored and embedded directly without
/// going through fact extraction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "document_chunks")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub content: String,
  #[serde(skip)]
  pub vector: PgVector,
  pub chunk_index: i32,
  pub original_document_id: Uuid,
  pub source: String,
  pub file_path: Option<String>,
  #[sea_orm(column_type = "custom(\"TEXT[]\")")]
  pub tags: Vec<String>,
  #[sea_orm(column_type = "JsonBinary")]
  pub metadata: Json,
  pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
