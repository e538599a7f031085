use sea_orm_migration::prelude::*;

use crate::m20250902_000001_create_subscriptions::SubscriptionPlans;

// tier, name, max listings, max featured, monthly price (cents)
const PLANS: [(&str, &str, i32, i32, i64); 4] = [
    ("free", "Free", 1, 0, 0),
    ("starter", "Starter", 5, 1, 999),
    ("pro", "Pro", 20, 5, 2999),
    ("elite", "Elite", 100, 20, 7999),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert.into_table(SubscriptionPlans::Table).columns([
            SubscriptionPlans::Tier,
            SubscriptionPlans::Name,
            SubscriptionPlans::MaxListings,
            SubscriptionPlans::MaxFeatured,
            SubscriptionPlans::MonthlyPrice,
        ]);
        for (tier, name, max_listings, max_featured, price) in PLANS {
            insert.values_panic([
                tier.into(),
                name.into(),
                max_listings.into(),
                max_featured.into(),
                price.into(),
            ]);
        }
        manager.exec_stmt(insert).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(SubscriptionPlans::Table)
            .and_where(
                Expr::col(SubscriptionPlans::Tier)
                    .is_in(PLANS.iter().map(|(tier, ..)| *tier)),
            )
            .to_owned();
        manager.exec_stmt(delete).await?;
        Ok(())
    }
}
