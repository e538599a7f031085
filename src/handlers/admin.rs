use crate::handlers::require_user_id;
use crate::models::*;
use crate::services::{ListingService, UserService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    params(AdminUserQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Users, newest first"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<AdminUserQuery>,
) -> Result<HttpResponse> {
    let admin_id = require_user_id(&req)?;

    match user_service.list_users(admin_id, &query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/approve",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User approved", body = UserResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn approve_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let admin_id = require_user_id(&req)?;

    match user_service.approve_user(admin_id, path.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

async fn set_banned(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    user_id: i32,
    banned: bool,
) -> Result<HttpResponse> {
    let admin_id = require_user_id(&req)?;

    match user_service.set_user_banned(admin_id, user_id, banned).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/ban",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User banned", body = UserResponse),
        (status = 400, description = "Admins cannot be banned"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn ban_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    set_banned(user_service, req, path.into_inner(), true).await
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/unban",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User unbanned", body = UserResponse),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn unban_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    set_banned(user_service, req, path.into_inner(), false).await
}

#[utoipa::path(
    put,
    path = "/admin/listings/{id}/state",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    request_body = SetListingStateRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "State changed", body = ListingResponse),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn set_listing_state(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<SetListingStateRequest>,
) -> Result<HttpResponse> {
    let admin_id = require_user_id(&req)?;

    match listing_service
        .set_listing_state(path.into_inner(), request.state, admin_id)
        .await
    {
        Ok(listing) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": listing
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/listings/{id}/featured",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    request_body = SetFeaturedRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Featured flag changed", body = ListingResponse),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn set_featured(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<SetFeaturedRequest>,
) -> Result<HttpResponse> {
    let admin_id = require_user_id(&req)?;

    match listing_service
        .set_featured(path.into_inner(), request.is_featured, admin_id)
        .await
    {
        Ok(listing) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": listing
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/listings/{id}",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listing deleted"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn delete_listing(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let admin_id = require_user_id(&req)?;

    match listing_service
        .admin_delete_listing(path.into_inner(), admin_id)
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Listing deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/users", web::get().to(list_users))
            .route("/users/{id}/approve", web::post().to(approve_user))
            .route("/users/{id}/ban", web::post().to(ban_user))
            .route("/users/{id}/unban", web::post().to(unban_user))
            .route("/listings/{id}", web::delete().to(delete_listing))
            .route("/listings/{id}/state", web::put().to(set_listing_state))
            .route("/listings/{id}/featured", web::put().to(set_featured)),
    );
}
