use crate::entities::{UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::user_service::find_user;
use crate::utils::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

#[derive(Clone)]
pub struct AuthService {
    pool: DatabaseConnection,
    jwt_service: JwtService,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AuthService {
    pub fn new(pool: DatabaseConnection, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(user.id, user.role)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id, user.role)?;
        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    async fn is_taken(&self, column: users::Column, value: &str) -> AppResult<bool> {
        let count = users::Entity::find()
            .filter(column.eq(value))
            .count(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        validate_email(&email)?;
        let username = request.username.trim().to_string();
        validate_username(&username)?;
        validate_password(&request.password)?;

        let is_approved = match request.role {
            UserRole::Customer => true,
            UserRole::Provider => false,
            UserRole::Admin => {
                return Err(AppError::ValidationError(
                    "Cannot self-register as administrator".to_string(),
                ));
            }
        };

        let phone = non_empty(request.phone).map(|p| normalize_phone(&p));
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }
        let national_id = non_empty(request.national_id);

        if self.is_taken(users::Column::Email, &email).await? {
            return Err(AppError::ValidationError(
                "Email is already registered".to_string(),
            ));
        }
        if let Some(phone) = &phone
            && self.is_taken(users::Column::Phone, phone).await?
        {
            return Err(AppError::ValidationError(
                "Phone number is already registered".to_string(),
            ));
        }
        if let Some(national_id) = &national_id
            && self.is_taken(users::Column::NationalId, national_id).await?
        {
            return Err(AppError::ValidationError(
                "National id is already registered".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let user = users::ActiveModel {
            email: Set(email),
            username: Set(username),
            password_hash: Set(password_hash),
            phone: Set(phone),
            national_id: Set(national_id),
            first_name: Set(non_empty(request.first_name)),
            last_name: Set(non_empty(request.last_name)),
            role: Set(request.role),
            is_approved: Set(is_approved),
            is_banned: Set(false),
            avatar_path: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Registered {} {} ({})", user.role, user.id, user.email);
        self.issue_tokens(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError("Invalid email or password".to_string()));
        }
        if user.is_banned {
            return Err(AppError::AuthError("Account is banned".to_string()));
        }

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, request: RefreshRequest) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(&request.refresh_token)?;
        let user = find_user(&self.pool, claims.user_id()?).await?;
        if user.is_banned {
            return Err(AppError::AuthError("Account is banned".to_string()));
        }
        self.issue_tokens(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestContext;

    fn service(ctx: &TestContext) -> AuthService {
        AuthService::new(ctx.db.clone(), JwtService::new("test-secret", 3600, 7200))
    }

    fn register_request(email: &str, role: UserRole) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: "driver".to_string(),
            password: "Password123".to_string(),
            role,
            phone: None,
            national_id: None,
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let ctx = TestContext::new().await;
        let svc = service(&ctx);

        let provider = svc
            .register(register_request("Seller@Example.com", UserRole::Provider))
            .await
            .unwrap();
        assert_eq!(provider.user.email, "seller@example.com");
        assert!(!provider.user.is_approved);

        let customer = svc
            .register(register_request("buyer@example.com", UserRole::Customer))
            .await
            .unwrap();
        assert!(customer.user.is_approved);

        let login = svc
            .login(LoginRequest {
                email: "seller@example.com".to_string(),
                password: "Password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, provider.user.id);

        let refreshed = svc
            .refresh_token(RefreshRequest {
                refresh_token: login.refresh_token,
            })
            .await
            .unwrap();
        assert_eq!(refreshed.user.id, provider.user.id);

        let wrong = svc
            .login(LoginRequest {
                email: "seller@example.com".to_string(),
                password: "Password124".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_admin() {
        let ctx = TestContext::new().await;
        let svc = service(&ctx);

        let mut first = register_request("a@example.com", UserRole::Customer);
        first.national_id = Some("ID-1".to_string());
        svc.register(first).await.unwrap();

        let same_email = svc
            .register(register_request("A@example.com", UserRole::Customer))
            .await;
        assert!(matches!(same_email, Err(AppError::ValidationError(_))));

        let mut same_id = register_request("b@example.com", UserRole::Customer);
        same_id.national_id = Some("ID-1".to_string());
        assert!(matches!(
            svc.register(same_id).await,
            Err(AppError::ValidationError(_))
        ));

        assert!(matches!(
            svc.register(register_request("c@example.com", UserRole::Admin)).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_login() {
        let ctx = TestContext::new().await;
        let svc = service(&ctx);
        let auth = svc
            .register(register_request("banned@example.com", UserRole::Customer))
            .await
            .unwrap();
        let user = find_user(&ctx.db, auth.user.id).await.unwrap();
        ctx.set_banned(&user, true).await;

        let result = svc
            .login(LoginRequest {
                email: "banned@example.com".to_string(),
                password: "Password123".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }
}
