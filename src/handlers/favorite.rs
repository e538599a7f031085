use crate::handlers::require_user_id;
use crate::models::*;
use crate::services::FavoriteService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/favorites",
    tag = "favorite",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Favorited listings, most recent first", body = [ListingCard]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_favorites(
    favorite_service: web::Data<FavoriteService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match favorite_service.list_favorites(user_id).await {
        Ok(items) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": items
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/favorites/{listing_id}",
    tag = "favorite",
    params(
        ("listing_id" = i32, Path, description = "Listing id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listing favorited"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn add_favorite(
    favorite_service: web::Data<FavoriteService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match favorite_service.add_favorite(user_id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "is_favorite": true }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/favorites/{listing_id}",
    tag = "favorite",
    params(
        ("listing_id" = i32, Path, description = "Listing id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Favorite removed")
    )
)]
pub async fn remove_favorite(
    favorite_service: web::Data<FavoriteService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match favorite_service
        .remove_favorite(user_id, path.into_inner())
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "is_favorite": false }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/favorites/{listing_id}/toggle",
    tag = "favorite",
    params(
        ("listing_id" = i32, Path, description = "Listing id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "New favorite state"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn toggle_favorite(
    favorite_service: web::Data<FavoriteService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match favorite_service
        .toggle_favorite(user_id, path.into_inner())
        .await
    {
        Ok(is_favorite) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "is_favorite": is_favorite }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn favorite_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/favorites")
            .route("", web::get().to(list_favorites))
            .route("/{listing_id}", web::post().to(add_favorite))
            .route("/{listing_id}", web::delete().to(remove_favorite))
            .route("/{listing_id}/toggle", web::post().to(toggle_favorite)),
    );
}
