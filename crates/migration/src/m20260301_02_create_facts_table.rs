use sea_orm_migration::{
  prelude::*,
  schema::{custom, json_binary, small_integer, string, text, timestamp_with_time_zone, uuid},
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
          .table(Facts::Table)
          .if_not_exists()
          .col(uuid(Facts::Id).primary_key())
          .col(text(Facts::Content).not_null())
          .col(timestamp_with_time_zone(Facts::Timestamp).not_null().default(Expr::current_timestamp()))
          .col(string(Facts::Source).not_null())
          .col(custom(Facts::Tags, "TEXT[]").not_null().default("{}"))
          .col(custom(Facts::DocumentReferences, "UUID[]").not_null().default("{}"))
          .col(json_binary(Facts::MetadataJson).not_null().default("{}"))
          .col(string(Facts::Category).not_null())
          .col(string(Facts::Subject).not_null())
          .col(string(Facts::Attribute).not_null())
          .col(string(Facts::Value).not_null())
          .col(string(Facts::TemporalContext).null())
          .col(string(Facts::Sensitivity).not_null().default(""))
          .col(small_integer(Facts::Importance).not_null().default(0))
          .col(string(Facts::FilePath).null())
          .col(custom(Facts::Vector, "vector(1024)").not_null())
          .col(timestamp_with_time_zone(Facts::CreatedAt).not_null().default(Expr::current_timestamp()))
          .to_owned(),
      )
      .await?;

    // HNSW index for cosine-distance similarity search (`embedding <=> $n`,
    // matching the `Query` contract's distance semantics).
    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE INDEX idx_facts_vector ON facts USING hnsw (vector vector_cosine_ops);",
      ))
      .await?;

    // Subject is the decision engine's partition key — every UPDATE/DELETE
    // candidate search filters on it first.
    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE INDEX idx_facts_subject ON facts (subject);",
      ))
      .await?;

    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE INDEX idx_facts_tags ON facts USING gin (tags);",
      ))
      .await?;

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Facts::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum Facts {
  Table,

  Id,
  Content,
  Timestamp,
  Source,
  Tags,
  DocumentReferences,
  MetadataJson,       // legacy fallback column for keys with no direct column
  Category,
  Subject,             // partition key for memory evolution
  Attribute,
  Value,
  TemporalContext,
  Sensitivity,
  Importance,
  FilePath,
  Vector,              // vector(1024), matches the embedding adapter's fixed width
  CreatedAt,
}
