//! Database migrations for the back-office API.
//!
//! Every table is created through SeaORM Migration so the same schema runs on
//! Postgres in deployment and on SQLite in tests.

pub use sea_orm_migration::prelude::*;

mod m2025_01_01_000001_create_companies_and_users;
mod m2025_01_01_000002_create_bank_accounts;
mod m2025_01_01_000003_create_contacts_and_categories;
mod m2025_01_01_000004_create_financial_entries;
mod m2025_01_01_000005_create_recurring_rules;
mod m2025_01_01_000006_create_products;
mod m2025_01_02_000001_create_ml_integrations;
mod m2025_01_02_000002_create_connection_tokens_and_oauth_states;
mod m2025_01_03_000001_add_listing_category_name;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_01_000001_create_companies_and_users::Migration),
            Box::new(m2025_01_01_000002_create_bank_accounts::Migration),
            Box::new(m2025_01_01_000003_create_contacts_and_categories::Migration),
            Box::new(m2025_01_01_000004_create_financial_entries::Migration),
            Box::new(m2025_01_01_000005_create_recurring_rules::Migration),
            Box::new(m2025_01_01_000006_create_products::Migration),
            Box::new(m2025_01_02_000001_create_ml_integrations::Migration),
            Box::new(m2025_01_02_000002_create_connection_tokens_and_oauth_states::Migration),
            Box::new(m2025_01_03_000001_add_listing_category_name::Migration),
        ]
    }
}
