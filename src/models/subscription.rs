use crate::entities::{
    SubscriptionStatus, SubscriptionTier, subscription_plan_entity as plans,
    user_subscription_entity as subs,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Why a quota check refused an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum QuotaDenial {
    NoActiveSubscription,
    ListingLimitExceeded { limit: i32 },
    FeatureSlotExceeded { limit: i32 },
}

impl QuotaDenial {
    pub fn code(&self) -> &'static str {
        match self {
            QuotaDenial::NoActiveSubscription => "NO_ACTIVE_SUBSCRIPTION",
            QuotaDenial::ListingLimitExceeded { .. } => "LISTING_LIMIT_EXCEEDED",
            QuotaDenial::FeatureSlotExceeded { .. } => "FEATURE_SLOT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for QuotaDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaDenial::NoActiveSubscription => write!(f, "No active subscription"),
            QuotaDenial::ListingLimitExceeded { limit } => {
                write!(f, "Listing limit of {limit} reached for the current plan")
            }
            QuotaDenial::FeatureSlotExceeded { limit } => {
                write!(f, "Featured slot limit of {limit} reached for the current plan")
            }
        }
    }
}

/// Outcome of a quota check; denials are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Allowed,
    Denied(QuotaDenial),
}

impl QuotaCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaCheck::Allowed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    pub id: i32,
    pub tier: SubscriptionTier,
    pub name: String,
    pub max_listings: i32,
    pub max_featured: i32,
    /// cents
    pub monthly_price: i64,
}

impl From<plans::Model> for PlanResponse {
    fn from(m: plans::Model) -> Self {
        Self {
            id: m.id,
            tier: m.tier,
            name: m.name,
            max_listings: m.max_listings,
            max_featured: m.max_featured,
            monthly_price: m.monthly_price,
        }
    }
}

/// A user subscription joined with its plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSubscription {
    pub subscription: subs::Model,
    pub plan: plans::Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSubscriptionResponse {
    pub id: i32,
    pub plan: PlanResponse,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub is_active: bool,
}

impl UserSubscriptionResponse {
    pub fn build(sub: subs::Model, plan: plans::Model, now: DateTime<Utc>) -> Self {
        Self {
            id: sub.id,
            is_active: sub.is_active_at(now),
            plan: PlanResponse::from(plan),
            start_date: sub.start_date,
            end_date: sub.end_date,
            status: sub.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaUsageResponse {
    pub plan: Option<PlanResponse>,
    pub listing_count: u64,
    pub featured_count: u64,
    pub max_listings: i32,
    pub max_featured: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub plan_id: i32,
    /// cents; when present it must match the plan price
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptureOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "planId")]
    pub plan_id: i32,
}
