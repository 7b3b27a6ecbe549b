//! Cloud database migrator

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_gates;
mod m20250301_000002_create_slots;
mod m20250301_000003_create_vehicles;
mod m20250301_000004_create_transactions;
mod m20250301_000005_create_processed_events;
mod m20250301_000006_create_payments;
mod m20250301_000007_create_users;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_gates::Migration),
            Box::new(m20250301_000002_create_slots::Migration),
            Box::new(m20250301_000003_create_vehicles::Migration),
            Box::new(m20250301_000004_create_transactions::Migration),
            Box::new(m20250301_000005_create_processed_events::Migration),
            Box::new(m20250301_000006_create_payments::Migration),
            Box::new(m20250301_000007_create_users::Migration),
        ]
    }
}
