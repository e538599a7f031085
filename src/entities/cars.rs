use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    #[sea_orm(string_value = "petrol")]
    Petrol,
    #[sea_orm(string_value = "diesel")]
    Diesel,
    #[sea_orm(string_value = "electric")]
    Electric,
    #[sea_orm(string_value = "hybrid")]
    Hybrid,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    #[sea_orm(string_value = "manual")]
    Manual,
    #[sea_orm(string_value = "automatic")]
    Automatic,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "cars")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub manufacturer: String,
    pub model: String,
    pub year: i32,
    pub body_style: String,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub horsepower: i32,
    pub doors: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::listings::Entity")]
    Listings,
}

impl Related<super::listings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
