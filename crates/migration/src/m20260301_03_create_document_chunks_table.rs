use sea_orm_migration::{
  prelude::*,
  schema::{custom, integer, json_binary, string, text, timestamp_with_time_zone, uuid},
  sea_orm::Statement,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(DocumentChunks::Table)
          .if_not_exists()
          .col(uuid(DocumentChunks::Id).primary_key())
          .col(text(DocumentChunks::Content).not_null())
          .col(custom(DocumentChunks::Vector, "vector(1024)").not_null())
          .col(integer(DocumentChunks::ChunkIndex).not_null())
          .col(uuid(DocumentChunks::OriginalDocumentId).not_null())
          .col(string(DocumentChunks::Source).not_null())
          .col(string(DocumentChunks::FilePath).null())
          .col(custom(DocumentChunks::Tags, "TEXT[]").not_null().default("{}"))
          .col(json_binary(DocumentChunks::Metadata).not_null().default("{}"))
          .col(timestamp_with_time_zone(DocumentChunks::CreatedAt).not_null().default(Expr::current_timestamp()))
          .to_owned(),
      )
      .await?;

    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE INDEX idx_document_chunks_vector ON document_chunks USING hnsw (vector vector_cosine_ops);",
      ))
      .await?;

    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE INDEX idx_document_chunks_original_document_id ON document_chunks (original_document_id);",
      ))
      .await?;

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(DocumentChunks::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum DocumentChunks {
  Table,

  Id,
  Content,
  Vector,
  ChunkIndex,
  OriginalDocumentId,
  Source,
  FilePath,
  Tags,
  Metadata,
  CreatedAt,
}
