use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_users::Users;

#[derive(DeriveIden)]
pub(crate) enum Cars {
    Table,
    Id,
    Manufacturer,
    Model,
    Year,
    BodyStyle,
    FuelType,
    Transmission,
    Horsepower,
    Doors,
}

#[derive(DeriveIden)]
pub(crate) enum Listings {
    Table,
    Id,
    CarId,
    OwnerId,
    ListingType,
    RentPrice,
    NewPrice,
    OldPrice,
    Description,
    Color,
    State,
    IsFeatured,
    Discount,
    Views,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Id,
    ListingId,
    Path,
    AltText,
    IsPrimary,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cars::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Cars::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Cars::Manufacturer).string_len(64).not_null())
                    .col(ColumnDef::new(Cars::Model).string_len(64).not_null())
                    .col(ColumnDef::new(Cars::Year).integer().not_null())
                    .col(ColumnDef::new(Cars::BodyStyle).string_len(32).not_null())
                    .col(ColumnDef::new(Cars::FuelType).string_len(16).not_null())
                    .col(ColumnDef::new(Cars::Transmission).string_len(16).not_null())
                    .col(ColumnDef::new(Cars::Horsepower).integer().not_null())
                    .col(ColumnDef::new(Cars::Doors).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Listings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Listings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Listings::CarId).integer().not_null())
                    .col(ColumnDef::new(Listings::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Listings::ListingType).string_len(16).not_null())
                    .col(ColumnDef::new(Listings::RentPrice).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Listings::NewPrice).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Listings::OldPrice).big_integer().null())
                    .col(ColumnDef::new(Listings::Description).text().not_null())
                    .col(ColumnDef::new(Listings::Color).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Listings::State)
                            .string_len(16)
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(Listings::IsFeatured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Listings::Discount).integer().not_null().default(0))
                    .col(ColumnDef::new(Listings::Views).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Listings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Listings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listings_car")
                            .from(Listings::Table, Listings::CarId)
                            .to(Cars::Table, Cars::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listings_owner")
                            .from(Listings::Table, Listings::OwnerId)
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
                    .name("idx_listings_owner")
                    .table(Listings::Table)
                    .col(Listings::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Images::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Images::ListingId).integer().not_null())
                    .col(ColumnDef::new(Images::Path).string_len(512).not_null())
                    .col(ColumnDef::new(Images::AltText).string_len(255).null())
                    .col(
                        ColumnDef::new(Images::IsPrimary)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_listing")
                            .from(Images::Table, Images::ListingId)
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
                    .name("idx_images_listing")
                    .table(Images::Table)
                    .col(Images::ListingId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Images::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Listings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Cars::Table).to_owned())
            .await?;
        Ok(())
    }
}
