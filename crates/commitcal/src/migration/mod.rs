//! Schema migrations (requires the `migrate` feature).

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_schema;

/// Runs the commitcal schema migrations in order.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250301_000001_create_schema::Migration)]
    }

    // Own bookkeeping table so the cache can share a database with other tools.
    fn migration_table_name() -> SeaRc<dyn Iden> {
        SeaRc::new(Alias::new("commitcal_migrations"))
    }
}
