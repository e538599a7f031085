pub mod cars;
pub mod favorites;
pub mod images;
pub mod listings;
pub mod payment_orders;
pub mod reviews;
pub mod subscription_plans;
pub mod user_subscriptions;
pub mod users;
pub mod view_history;

pub use cars as car_entity;
pub use cars::{FuelType, Transmission};
pub use favorites as favorite_entity;
pub use images as image_entity;
pub use listings as listing_entity;
pub use listings::{ListingState, ListingType};
pub use payment_orders as payment_order_entity;
pub use payment_orders::PaymentOrderStatus;
pub use reviews as review_entity;
pub use subscription_plans as subscription_plan_entity;
pub use subscription_plans::SubscriptionTier;
pub use user_subscriptions as user_subscription_entity;
pub use user_subscriptions::SubscriptionStatus;
pub use users as user_entity;
pub use users::UserRole;
pub use view_history as view_history_entity;
