use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "starter")]
    Starter,
    #[sea_orm(string_value = "pro")]
    Pro,
    #[sea_orm(string_value = "elite")]
    Elite,
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionTier::Free => write!(f, "free"),
            SubscriptionTier::Starter => write!(f, "starter"),
            SubscriptionTier::Pro => write!(f, "pro"),
            SubscriptionTier::Elite => write!(f, "elite"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "subscription_plans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub tier: SubscriptionTier,
    pub name: String,
    pub max_listings: i32,
    pub max_featured: i32,
    /// cents
    pub monthly_price: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_subscriptions::Entity")]
    UserSubscriptions,
}

impl Related<super::user_subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserSubscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
