pub use sea_orm_migration::*;

mod m20260301_01_create_stored_documents_table;
mod m20260301_02_create_facts_table;
mod m20260301_03_create_document_chunks_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260301_01_create_stored_documents_table::Migration),
      Box::new(m20260301_02_create_facts_table::Migration),
      Box::new(m20260301_03_create_document_chunks_table::Migration),
    ]
  }
}
