use crate::handlers::require_user_id;
use crate::models::*;
use crate::services::ViewHistoryService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/history",
    tag = "history",
    params(HistoryQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Recently viewed listings", body = HistoryResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_history(
    history_service: web::Data<ViewHistoryService>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match history_service.get_history(user_id, &query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/history",
    tag = "history",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "History cleared")
    )
)]
pub async fn clear_history(
    history_service: web::Data<ViewHistoryService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match history_service.clear_history(user_id).await {
        Ok(removed) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "removed": removed }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/history/{id}",
    tag = "history",
    params(
        ("id" = i32, Path, description = "History entry id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Entry removed")
    )
)]
pub async fn remove_entry(
    history_service: web::Data<ViewHistoryService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match history_service.remove_entry(path.into_inner(), user_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "History entry removed"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn history_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/history")
            .route("", web::get().to(get_history))
            .route("", web::delete().to(clear_history))
            .route("/{id}", web::delete().to(remove_entry)),
    );
}
