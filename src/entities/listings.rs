use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    #[sea_orm(string_value = "for_selling")]
    ForSelling,
    #[sea_orm(string_value = "for_renting")]
    ForRenting,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "sold")]
    Sold,
    #[sea_orm(string_value = "rented")]
    Rented,
    #[sea_orm(string_value = "unavailable")]
    Unavailable,
}

impl ListingState {
    /// Admin-driven transitions. Re-setting the current state is handled by the caller as a no-op.
    pub fn can_transition_to(self, next: ListingState) -> bool {
        match (self, next) {
            (ListingState::Available, ListingState::Sold)
            | (ListingState::Available, ListingState::Rented)
            | (ListingState::Available, ListingState::Unavailable)
            | (ListingState::Unavailable, ListingState::Available) => true,
            (ListingState::Available, ListingState::Available)
            | (ListingState::Sold, _)
            | (ListingState::Rented, _)
            | (ListingState::Unavailable, _) => false,
        }
    }
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingState::Available => write!(f, "available"),
            ListingState::Sold => write!(f, "sold"),
            ListingState::Rented => write!(f, "rented"),
            ListingState::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub car_id: i32,
    pub owner_id: i32,
    pub listing_type: ListingType,
    /// cents
    pub rent_price: i64,
    /// cents
    pub new_price: i64,
    pub old_price: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub color: String,
    pub state: ListingState,
    pub is_featured: bool,
    pub discount: i32,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// NewPrice for selling listings, RentPrice for rentals.
    pub fn effective_price(&self) -> i64 {
        match self.listing_type {
            ListingType::ForSelling => self.new_price,
            ListingType::ForRenting => self.rent_price,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cars::Entity",
        from = "Column::CarId",
        to = "super::cars::Column::Id"
    )]
    Car,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::images::Entity")]
    Images,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::favorites::Entity")]
    Favorites,
    #[sea_orm(has_many = "super::view_history::Entity")]
    ViewHistory,
}

impl Related<super::cars::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Car.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::images::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::favorites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorites.def()
    }
}

impl Related<super::view_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ViewHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
