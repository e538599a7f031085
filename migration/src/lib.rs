pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_users;
mod m20250901_000002_create_listings;
mod m20250901_000003_create_engagement;
mod m20250902_000001_create_subscriptions;
mod m20250902_000002_seed_subscription_plans;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_users::Migration),
            Box::new(m20250901_000002_create_listings::Migration),
            Box::new(m20250901_000003_create_engagement::Migration),
            Box::new(m20250902_000001_create_subscriptions::Migration),
            Box::new(m20250902_000002_seed_subscription_plans::Migration),
        ]
    }
}
