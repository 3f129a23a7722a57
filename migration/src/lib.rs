pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_users;
mod m20240601_000002_create_catalog;
mod m20240601_000003_create_subscriptions;
mod m20240601_000004_create_enrollments_and_completions;
mod m20240601_000005_create_payment_transactions;
mod m20240601_000006_create_scheduled_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_users::Migration),
            Box::new(m20240601_000002_create_catalog::Migration),
            Box::new(m20240601_000003_create_subscriptions::Migration),
            Box::new(m20240601_000004_create_enrollments_and_completions::Migration),
            Box::new(m20240601_000005_create_payment_transactions::Migration),
            Box::new(m20240601_000006_create_scheduled_jobs::Migration),
        ]
    }
}
