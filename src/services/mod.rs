pub mod auth_service;
pub mod browse_service;
pub mod favorite_service;
pub mod listing_service;
pub mod review_service;
pub mod subscription_service;
pub mod user_service;
pub mod view_history_service;

pub use auth_service::*;
pub use browse_service::BrowseService;
pub use favorite_service::*;
pub use listing_service::ListingService;
pub use review_service::*;
pub use subscription_service::{SUBSCRIPTION_PERIOD_DAYS, SubscriptionService};
pub use user_service::UserService;
pub use view_history_service::*;
