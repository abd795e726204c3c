use sea_orm_migration::{
  prelude::*,
  schema::{json_binary, string, string_uniq, text, timestamp_with_time_zone, uuid},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(StoredDocuments::Table)
          .if_not_exists()
          .col(uuid(StoredDocuments::Id).primary_key())
          .col(text(StoredDocuments::Content).not_null())
          .col(string_uniq(StoredDocuments::ContentHash))
          .col(string(StoredDocuments::DocType).not_null())
          .col(string(StoredDocuments::OriginalId).not_null())
          .col(json_binary(StoredDocuments::Metadata).not_null().default("{}"))
          .col(timestamp_with_time_zone(StoredDocuments::CreatedAt).not_null().default(Expr::current_timestamp()))
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(StoredDocuments::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum StoredDocuments {
  Table,

  Id,           // uuid v4
  Content,      // original document content
  ContentHash,  // SHA-256 hex of Content; unique, dedup key
  DocType,      // "text" | "conversation" | "file"
  OriginalId,   // the caller-supplied Document::id(), stringified
  Metadata,     // arbitrary caller metadata
  CreatedAt,
}
