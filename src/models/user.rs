use crate::entities::{UserRole, user_entity as users};
use crate::models::ImageUpload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "jane")]
    pub username: String,
    #[schema(example = "Password123")]
    pub password: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "Password123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<ImageUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub is_approved: bool,
    pub is_banned: bool,
    pub avatar_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            phone: user.phone,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_approved: user.is_approved,
            is_banned: user.is_banned,
            avatar_path: user.avatar_path,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminUserQuery {
    pub role: Option<UserRole>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
