//! Warehouse schema migrations.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_warehouse_schema;

/// The migrator that creates and upgrades the warehouse tables.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_create_warehouse_schema::Migration)]
    }

    fn migration_table_name() -> SeaRc<dyn Iden> {
        SeaRc::new(Alias::new("devpulse_migrations"))
    }
}
