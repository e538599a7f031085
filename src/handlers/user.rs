use crate::handlers::require_user_id;
use crate::models::*;
use crate::services::UserService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/user/profile",
    tag = "user",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match user_service.get_user_profile(user_id).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "user": user
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/user/profile",
    tag = "user",
    request_body = UpdateProfileRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_profile(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match user_service
        .update_user_profile(user_id, request.into_inner())
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "user": user
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::put().to(update_profile)),
    );
}
