pub mod admin;
pub mod auth;
pub mod favorite;
pub mod history;
pub mod listing;
pub mod review;
pub mod subscription;
pub mod uploads;
pub mod user;

pub use admin::admin_config;
pub use auth::auth_config;
pub use favorite::favorite_config;
pub use history::history_config;
pub use listing::listing_config;
pub use review::review_config;
pub use subscription::subscription_config;
pub use uploads::uploads_config;
pub use user::user_config;

use crate::error::{AppError, AppResult};
use actix_web::{HttpMessage, HttpRequest};

/// The caller's id, when the request carried a valid access token.
pub(crate) fn get_user_id_from_request(req: &HttpRequest) -> Option<i32> {
    req.extensions().get::<i32>().copied()
}

pub(crate) fn require_user_id(req: &HttpRequest) -> AppResult<i32> {
    get_user_id_from_request(req)
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}
