use crate::handlers::{get_user_id_from_request, require_user_id};
use crate::models::*;
use crate::services::{
    BrowseService, ListingService, ReviewService, ViewContext, ViewHistoryService,
};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

fn view_context(req: &HttpRequest) -> ViewContext {
    ViewContext {
        user_id: get_user_id_from_request(req),
        user_agent: req
            .headers()
            .get("User-Agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
    }
}

#[utoipa::path(
    get,
    path = "/listings",
    tag = "listing",
    params(BrowseQuery),
    responses(
        (status = 200, description = "One page of available listings", body = BrowseResponse)
    )
)]
pub async fn browse(
    browse_service: web::Data<BrowseService>,
    query: web::Query<BrowseQuery>,
) -> Result<HttpResponse> {
    match browse_service.browse(&query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/listings/featured",
    tag = "listing",
    responses(
        (status = 200, description = "Featured listings, newest first", body = [ListingCard])
    )
)]
pub async fn featured(browse_service: web::Data<BrowseService>) -> Result<HttpResponse> {
    match browse_service.get_featured().await {
        Ok(items) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": items
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/listings/mine",
    tag = "listing",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listings owned by the caller", body = [ListingResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_listings(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match listing_service.list_own_listings(user_id).await {
        Ok(items) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": items
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Listing page. Counts the view and records it in the viewer's history.
#[utoipa::path(
    get,
    path = "/listings/{id}",
    tag = "listing",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    responses(
        (status = 200, description = "Listing details", body = ListingDetailsResponse),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn get_listing(
    listing_service: web::Data<ListingService>,
    history_service: web::Data<ViewHistoryService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let listing_id = path.into_inner();
    let context = view_context(&req);
    let viewer_id = context.user_id;

    listing_service.increment_views(listing_id).await;
    match listing_service
        .get_listing_details(listing_id, viewer_id)
        .await
    {
        Ok(details) => {
            history_service.record_view(listing_id, context).await;
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": details
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/listings",
    tag = "listing",
    request_body = CreateListingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Listing created", body = ListingResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Account cannot publish"),
        (status = 409, description = "Subscription quota exceeded")
    )
)]
pub async fn create_listing(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    request: web::Json<CreateListingRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;
    let (input, files) = request.into_inner().into_parts()?;

    match listing_service.create_listing(user_id, input, files).await {
        Ok(listing) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": listing
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/listings/{id}",
    tag = "listing",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    request_body = UpdateListingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found"),
        (status = 409, description = "Featured quota exceeded")
    )
)]
pub async fn update_listing(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<UpdateListingRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;
    let (changes, files) = request.into_inner().into_parts()?;

    match listing_service
        .update_listing(path.into_inner(), user_id, changes, files)
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
    path = "/listings/{id}",
    tag = "listing",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listing deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn delete_listing(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match listing_service.delete_listing(path.into_inner(), user_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Listing deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/listings/{id}/primary-image",
    tag = "listing",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    request_body = SetPrimaryImageRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Primary image changed", body = ListingResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing or image not found")
    )
)]
pub async fn set_primary_image(
    listing_service: web::Data<ListingService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<SetPrimaryImageRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match listing_service
        .set_primary_image(path.into_inner(), request.image_id, user_id)
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
    get,
    path = "/listings/{id}/reviews",
    tag = "review",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    responses(
        (status = 200, description = "Reviews, newest first", body = [ReviewResponse])
    )
)]
pub async fn list_reviews(
    review_service: web::Data<ReviewService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match review_service.list_reviews(path.into_inner()).await {
        Ok(reviews) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": reviews
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/listings/{id}/reviews",
    tag = "review",
    params(
        ("id" = i32, Path, description = "Listing id")
    ),
    request_body = ReviewRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Review added", body = ReviewResponse),
        (status = 400, description = "Invalid rating or duplicate review"),
        (status = 403, description = "Own listing or banned account"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn add_review(
    review_service: web::Data<ReviewService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<ReviewRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match review_service
        .add_review(user_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(review) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": review
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn listing_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/listings")
            .route("", web::get().to(browse))
            .route("", web::post().to(create_listing))
            .route("/featured", web::get().to(featured))
            .route("/mine", web::get().to(my_listings))
            .route("/{id}", web::get().to(get_listing))
            .route("/{id}", web::put().to(update_listing))
            .route("/{id}", web::delete().to(delete_listing))
            .route("/{id}/primary-image", web::put().to(set_primary_image))
            .route("/{id}/reviews", web::get().to(list_reviews))
            .route("/{id}/reviews", web::post().to(add_review)),
    );
}
