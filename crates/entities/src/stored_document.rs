use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// The original input a fact was extracted from, content-addressed by the
/// SHA-256 of `content` so repeated ingestion of the same document is a
/// no-op (see `StorageBackend::upsert_document`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "stored_documents")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub content: String,
  #[sea_orm(unique)]
  pub content_hash: String,
  pub doc_type: String,
  pub original_id: String,
  #[sea_orm(column_type = "JsonBinary")]
  pub metadata: Json,
  pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
