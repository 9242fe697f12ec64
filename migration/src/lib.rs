pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260301_000001_tenancy;
mod m20260301_000002_requests;
mod m20260301_000003_reports;
mod m20260301_000004_chat;
mod m20260301_000005_feature_flags;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_tenancy::Migration),
            Box::new(m20260301_000002_requests::Migration),
            Box::new(m20260301_000003_reports::Migration),
            Box::new(m20260301_000004_chat::Migration),
            Box::new(m20260301_000005_feature_flags::Migration),
        ]
    }
}
