use crate::handlers::require_user_id;
use crate::models::*;
use crate::services::ReviewService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    put,
    path = "/reviews/{id}",
    tag = "review",
    params(
        ("id" = i32, Path, description = "Review id")
    ),
    request_body = ReviewRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Review updated", body = ReviewResponse),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    review_service: web::Data<ReviewService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<ReviewRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match review_service
        .update_review(path.into_inner(), user_id, request.into_inner())
        .await
    {
        Ok(review) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": review
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "review",
    params(
        ("id" = i32, Path, description = "Review id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Neither author nor admin"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    review_service: web::Data<ReviewService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match review_service.delete_review(path.into_inner(), user_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Review deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn review_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reviews")
            .route("/{id}", web::put().to(update_review))
            .route("/{id}", web::delete().to(delete_review)),
    );
}
