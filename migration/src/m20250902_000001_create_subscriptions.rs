use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_users::Users;

#[derive(DeriveIden)]
pub(crate) enum SubscriptionPlans {
    Table,
    Id,
    Tier,
    Name,
    MaxListings,
    MaxFeatured,
    MonthlyPrice,
}

#[derive(DeriveIden)]
enum UserSubscriptions {
    Table,
    Id,
    UserId,
    PlanId,
    StartDate,
    EndDate,
    Status,
    ExternalOrderId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PaymentOrders {
    Table,
    Id,
    ExternalOrderId,
    UserId,
    PlanId,
    Amount,
    Currency,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionPlans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubscriptionPlans::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionPlans::Tier)
                            .string_len(16)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SubscriptionPlans::Name).string_len(64).not_null())
                    .col(ColumnDef::new(SubscriptionPlans::MaxListings).integer().not_null())
                    .col(ColumnDef::new(SubscriptionPlans::MaxFeatured).integer().not_null())
                    .col(
                        ColumnDef::new(SubscriptionPlans::MonthlyPrice)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserSubscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserSubscriptions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserSubscriptions::UserId).integer().not_null())
                    .col(ColumnDef::new(UserSubscriptions::PlanId).integer().not_null())
                    .col(
                        ColumnDef::new(UserSubscriptions::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::Status)
                            .string_len(16)
                            .not_null()
                            .default("inactive"),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::ExternalOrderId)
                            .string_len(64)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_subscriptions_user")
                            .from(UserSubscriptions::Table, UserSubscriptions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_subscriptions_plan")
                            .from(UserSubscriptions::Table, UserSubscriptions::PlanId)
                            .to(SubscriptionPlans::Table, SubscriptionPlans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_subscriptions_user")
                    .table(UserSubscriptions::Table)
                    .col(UserSubscriptions::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentOrders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentOrders::ExternalOrderId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PaymentOrders::UserId).integer().not_null())
                    .col(ColumnDef::new(PaymentOrders::PlanId).integer().not_null())
                    .col(ColumnDef::new(PaymentOrders::Amount).big_integer().not_null())
                    .col(ColumnDef::new(PaymentOrders::Currency).string_len(8).not_null())
                    .col(
                        ColumnDef::new(PaymentOrders::Status)
                            .string_len(16)
                            .not_null()
                            .default("created"),
                    )
                    .col(
                        ColumnDef::new(PaymentOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PaymentOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_orders_user")
                            .from(PaymentOrders::Table, PaymentOrders::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(PaymentOrders::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(UserSubscriptions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(SubscriptionPlans::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
