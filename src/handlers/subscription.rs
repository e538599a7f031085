use crate::handlers::require_user_id;
use crate::models::*;
use crate::services::SubscriptionService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/subscriptions/plans",
    tag = "subscription",
    responses(
        (status = 200, description = "Plan catalogue ordered by tier", body = [PlanResponse])
    )
)]
pub async fn list_plans(
    subscription_service: web::Data<SubscriptionService>,
) -> Result<HttpResponse> {
    match subscription_service.list_plans().await {
        Ok(plans) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": plans
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/subscriptions/mine",
    tag = "subscription",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Subscription history, newest first", body = [UserSubscriptionResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_subscriptions(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match subscription_service.get_user_subscriptions(user_id).await {
        Ok(subscriptions) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": subscriptions
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/subscriptions/usage",
    tag = "subscription",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listing and featured usage against the active plan", body = QuotaUsageResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn quota_usage(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match subscription_service.get_quota_usage(user_id).await {
        Ok(usage) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": usage
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/subscriptions/free",
    tag = "subscription",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Free plan activated", body = UserSubscriptionResponse),
        (status = 400, description = "An active subscription already exists")
    )
)]
pub async fn activate_free_plan(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match subscription_service.activate_free_plan(user_id).await {
        Ok(subscription) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": subscription
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Body is the bare `{"id": ...}` object the PayPal JS SDK expects.
#[utoipa::path(
    post,
    path = "/subscriptions/create-order",
    tag = "subscription",
    request_body = CreateOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "PayPal order created", body = CreateOrderResponse),
        (status = 400, description = "Unknown plan or amount mismatch"),
        (status = 502, description = "PayPal unavailable")
    )
)]
pub async fn create_order(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match subscription_service
        .create_payment_order(user_id, request.into_inner())
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(order)),
        Err(e) => Ok(e.error_response()),
    }
}

/// Responds with the JSON string `"success"` or `"error"`.
#[utoipa::path(
    post,
    path = "/subscriptions/capture-order",
    tag = "subscription",
    request_body = CaptureOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "\"success\" or \"error\"", body = String)
    )
)]
pub async fn capture_order(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
    request: web::Json<CaptureOrderRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;
    let request = request.into_inner();
    let order_id = request.order_id.clone();

    match subscription_service
        .capture_payment_order(user_id, request)
        .await
    {
        Ok(subscription) => {
            log::info!(
                "Subscription {} activated for user {user_id} via order {order_id}",
                subscription.id
            );
            Ok(HttpResponse::Ok().json("success"))
        }
        Err(e) => {
            log::warn!("Capture of order {order_id} failed for user {user_id}: {e}");
            Ok(HttpResponse::Ok().json("error"))
        }
    }
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subscriptions")
            .route("/plans", web::get().to(list_plans))
            .route("/mine", web::get().to(my_subscriptions))
            .route("/usage", web::get().to(quota_usage))
            .route("/free", web::post().to(activate_free_plan))
            .route("/create-order", web::post().to(create_order))
            .route("/capture-order", web::post().to(capture_order)),
    );
}
