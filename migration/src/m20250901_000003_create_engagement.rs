use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_users::Users;
use crate::m20250901_000002_create_listings::Listings;

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    UserId,
    ListingId,
    Rating,
    Comment,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Favorites {
    Table,
    Id,
    UserId,
    ListingId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ViewHistory {
    Table,
    Id,
    ListingId,
    UserId,
    ViewedAt,
    UserAgent,
    IpAddress,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reviews::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reviews::UserId).integer().not_null())
                    .col(ColumnDef::new(Reviews::ListingId).integer().not_null())
                    .col(ColumnDef::new(Reviews::Rating).integer().not_null())
                    .col(ColumnDef::new(Reviews::Comment).text().not_null())
                    .col(
                        ColumnDef::new(Reviews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Reviews::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Reviews::Rating).between(1, 5))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_user")
                            .from(Reviews::Table, Reviews::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_listing")
                            .from(Reviews::Table, Reviews::ListingId)
                            .to(Listings::Table, Listings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_reviews_listing")
                    .table(Reviews::Table)
                    .col(Reviews::ListingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_reviews_user_listing")
                    .table(Reviews::Table)
                    .col(Reviews::UserId)
                    .col(Reviews::ListingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Favorites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Favorites::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Favorites::UserId).integer().not_null())
                    .col(ColumnDef::new(Favorites::ListingId).integer().not_null())
                    .col(
                        ColumnDef::new(Favorites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorites_user")
                            .from(Favorites::Table, Favorites::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorites_listing")
                            .from(Favorites::Table, Favorites::ListingId)
                            .to(Listings::Table, Listings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_favorites_user_listing")
                    .table(Favorites::Table)
                    .col(Favorites::UserId)
                    .col(Favorites::ListingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ViewHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ViewHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ViewHistory::ListingId).integer().not_null())
                    .col(ColumnDef::new(ViewHistory::UserId).integer().null())
                    .col(
                        ColumnDef::new(ViewHistory::ViewedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ViewHistory::UserAgent).string_len(512).null())
                    .col(ColumnDef::new(ViewHistory::IpAddress).string_len(64).null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_view_history_listing")
                            .from(ViewHistory::Table, ViewHistory::ListingId)
                            .to(Listings::Table, Listings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_view_history_user")
                            .from(ViewHistory::Table, ViewHistory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_view_history_user_listing")
                    .table(ViewHistory::Table)
                    .col(ViewHistory::UserId)
                    .col(ViewHistory::ListingId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(ViewHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Favorites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Reviews::Table).to_owned())
            .await?;
        Ok(())
    }
}
