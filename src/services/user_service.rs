use crate::entities::{UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::SharedFileStorage;
use crate::models::*;
use crate::utils::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

const AVATAR_FOLDER: &str = "avatars";

pub(crate) async fn find_user<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Load the caller and make sure they are an active admin.
pub(crate) async fn require_admin<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> AppResult<users::Model> {
    let user = find_user(conn, user_id).await?;
    if !is_admin(&user) {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
    storage: SharedFileStorage,
}

impl UserService {
    pub fn new(pool: DatabaseConnection, storage: SharedFileStorage) -> Self {
        Self { pool, storage }
    }

    pub async fn get_user_profile(&self, user_id: i32) -> AppResult<UserResponse> {
        Ok(UserResponse::from(find_user(&self.pool, user_id).await?))
    }

    pub async fn update_user_profile(
        &self,
        user_id: i32,
        request: UpdateProfileRequest,
    ) -> AppResult<UserResponse> {
        if request.username.is_none()
            && request.first_name.is_none()
            && request.last_name.is_none()
            && request.phone.is_none()
            && request.avatar.is_none()
        {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }

        let user = find_user(&self.pool, user_id).await?;
        let old_avatar = user.avatar_path.clone();
        let mut model = user.into_active_model();

        if let Some(username) = request.username {
            let username = username.trim().to_string();
            validate_username(&username)?;
            model.username = Set(username);
        }
        if let Some(first_name) = request.first_name {
            model.first_name = Set(Some(first_name.trim().to_string()).filter(|s| !s.is_empty()));
        }
        if let Some(last_name) = request.last_name {
            model.last_name = Set(Some(last_name.trim().to_string()).filter(|s| !s.is_empty()));
        }
        if let Some(phone) = request.phone {
            let phone = normalize_phone(&phone);
            if phone.is_empty() {
                model.phone = Set(None);
            } else {
                validate_phone(&phone)?;
                let taken = users::Entity::find()
                    .filter(users::Column::Phone.eq(phone.as_str()))
                    .filter(users::Column::Id.ne(user_id))
                    .count(&self.pool)
                    .await?;
                if taken > 0 {
                    return Err(AppError::ValidationError(
                        "Phone number is already registered".to_string(),
                    ));
                }
                model.phone = Set(Some(phone));
            }
        }

        let new_avatar = match request.avatar {
            Some(upload) => {
                let file = upload.decode()?;
                let path = self.storage.save_file(&file, AVATAR_FOLDER)?;
                model.avatar_path = Set(Some(path.clone()));
                Some(path)
            }
            None => None,
        };
        model.updated_at = Set(Utc::now());

        let updated = match model.update(&self.pool).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(path) = &new_avatar {
                    self.storage.delete_file(path);
                }
                return Err(e.into());
            }
        };

        if new_avatar.is_some()
            && let Some(old) = old_avatar
        {
            self.storage.delete_file(&old);
        }
        Ok(UserResponse::from(updated))
    }

    pub async fn list_users(
        &self,
        admin_id: i32,
        query: &AdminUserQuery,
    ) -> AppResult<PaginatedResponse<UserResponse>> {
        require_admin(&self.pool, admin_id).await?;
        let params = PaginationParams::new(query.page, query.page_size);

        let mut select = users::Entity::find();
        if let Some(role) = query.role {
            select = select.filter(users::Column::Role.eq(role));
        }
        let total = select.clone().count(&self.pool).await?;
        let rows = select
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        let items = rows.into_iter().map(UserResponse::from).collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn approve_user(&self, admin_id: i32, user_id: i32) -> AppResult<UserResponse> {
        require_admin(&self.pool, admin_id).await?;
        let user = find_user(&self.pool, user_id).await?;
        if user.is_approved {
            return Ok(UserResponse::from(user));
        }
        let mut model = user.into_active_model();
        model.is_approved = Set(true);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&self.pool).await?;
        log::info!("Admin {admin_id} approved user {user_id}");
        Ok(UserResponse::from(updated))
    }

    pub async fn set_user_banned(
        &self,
        admin_id: i32,
        user_id: i32,
        banned: bool,
    ) -> AppResult<UserResponse> {
        require_admin(&self.pool, admin_id).await?;
        let user = find_user(&self.pool, user_id).await?;
        if user.role == UserRole::Admin {
            return Err(AppError::ValidationError(
                "Administrators cannot be banned".to_string(),
            ));
        }
        if user.is_banned == banned {
            return Ok(UserResponse::from(user));
        }
        let mut model = user.into_active_model();
        model.is_banned = Set(banned);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&self.pool).await?;
        log::info!(
            "Admin {admin_id} {} user {user_id}",
            if banned { "banned" } else { "unbanned" }
        );
        Ok(UserResponse::from(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestContext;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[tokio::test]
    async fn test_update_profile_and_avatar() {
        let ctx = TestContext::new().await;
        let user = ctx.create_user("jane", UserRole::Customer).await;
        let svc = UserService::new(ctx.db.clone(), ctx.shared_storage());

        let avatar = ImageUpload {
            file_name: "me.png".to_string(),
            content_base64: STANDARD.encode(b"png-bytes"),
            alt_text: None,
        };
        let updated = svc
            .update_user_profile(
                user.id,
                UpdateProfileRequest {
                    username: Some(" janie ".to_string()),
                    first_name: Some("Jane".to_string()),
                    last_name: None,
                    phone: Some("+1 (555) 010-2030".to_string()),
                    avatar: Some(avatar.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "janie");
        assert_eq!(updated.phone.as_deref(), Some("+15550102030"));
        let first_avatar = updated.avatar_path.clone().unwrap();
        assert!(first_avatar.starts_with("avatars/"));

        // replacing the avatar removes the old file
        let replaced = svc
            .update_user_profile(
                user.id,
                UpdateProfileRequest {
                    username: None,
                    first_name: None,
                    last_name: None,
                    phone: None,
                    avatar: Some(avatar),
                },
            )
            .await
            .unwrap();
        assert_ne!(replaced.avatar_path.unwrap(), first_avatar);
        assert_eq!(ctx.files_on_disk(), 1);
    }

    #[tokio::test]
    async fn test_phone_must_be_unique() {
        let ctx = TestContext::new().await;
        let a = ctx.create_user("a", UserRole::Customer).await;
        let b = ctx.create_user("b", UserRole::Customer).await;
        let svc = UserService::new(ctx.db.clone(), ctx.shared_storage());
        let request = |phone: &str| UpdateProfileRequest {
            username: None,
            first_name: None,
            last_name: None,
            phone: Some(phone.to_string()),
            avatar: None,
        };

        svc.update_user_profile(a.id, request("5550001111")).await.unwrap();
        assert!(matches!(
            svc.update_user_profile(b.id, request("555-000-1111")).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_moderation() {
        let ctx = TestContext::new().await;
        let admin = ctx.create_user("root", UserRole::Admin).await;
        let provider = ctx.create_user("seller", UserRole::Provider).await;
        let customer = ctx.create_user("buyer", UserRole::Customer).await;
        let svc = UserService::new(ctx.db.clone(), ctx.shared_storage());

        assert!(matches!(
            svc.set_user_banned(customer.id, provider.id, true).await,
            Err(AppError::Forbidden)
        ));
        let banned = svc.set_user_banned(admin.id, provider.id, true).await.unwrap();
        assert!(banned.is_banned);
        assert!(matches!(
            svc.set_user_banned(admin.id, admin.id, true).await,
            Err(AppError::ValidationError(_))
        ));

        let providers = svc
            .list_users(
                admin.id,
                &AdminUserQuery {
                    role: Some(UserRole::Provider),
                    page: None,
                    page_size: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(providers.pagination.total, 1);
        assert_eq!(providers.items[0].id, provider.id);
    }
}
