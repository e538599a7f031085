use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{
    FuelType, ListingState, ListingType, SubscriptionStatus, SubscriptionTier, Transmission,
    UserRole,
};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::listing::browse,
        handlers::listing::featured,
        handlers::listing::my_listings,
        handlers::listing::get_listing,
        handlers::listing::create_listing,
        handlers::listing::update_listing,
        handlers::listing::delete_listing,
        handlers::listing::set_primary_image,
        handlers::listing::list_reviews,
        handlers::listing::add_review,
        handlers::review::update_review,
        handlers::review::delete_review,
        handlers::favorite::list_favorites,
        handlers::favorite::add_favorite,
        handlers::favorite::remove_favorite,
        handlers::favorite::toggle_favorite,
        handlers::history::get_history,
        handlers::history::clear_history,
        handlers::history::remove_entry,
        handlers::subscription::list_plans,
        handlers::subscription::my_subscriptions,
        handlers::subscription::quota_usage,
        handlers::subscription::activate_free_plan,
        handlers::subscription::create_order,
        handlers::subscription::capture_order,
        handlers::admin::list_users,
        handlers::admin::approve_user,
        handlers::admin::ban_user,
        handlers::admin::unban_user,
        handlers::admin::set_listing_state,
        handlers::admin::set_featured,
        handlers::admin::delete_listing,
    ),
    components(
        schemas(
            UserRole,
            ListingState,
            ListingType,
            FuelType,
            Transmission,
            SubscriptionTier,
            SubscriptionStatus,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            AuthResponse,
            UserResponse,
            UpdateProfileRequest,
            ImageUpload,
            CarInput,
            CreateListingRequest,
            UpdateListingRequest,
            SetPrimaryImageRequest,
            SetListingStateRequest,
            SetFeaturedRequest,
            CarResponse,
            ImageResponse,
            ListingCard,
            OwnerSummary,
            ListingResponse,
            ListingDetailsResponse,
            SortBy,
            BrowseResponse,
            PaginationInfo,
            ReviewRequest,
            ReviewResponse,
            HistoryItem,
            HistoryResponse,
            PlanResponse,
            UserSubscriptionResponse,
            QuotaUsageResponse,
            CreateOrderRequest,
            CreateOrderResponse,
            CaptureOrderRequest,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and tokens"),
        (name = "user", description = "Own profile"),
        (name = "listing", description = "Car listings"),
        (name = "review", description = "Listing reviews"),
        (name = "favorite", description = "Saved listings"),
        (name = "history", description = "Recently viewed listings"),
        (name = "subscription", description = "Plans, quota and PayPal checkout"),
        (name = "admin", description = "Moderation"),
    ),
    info(
        title = "Car Marketplace API",
        version = "1.0.0",
        description = "Car Marketplace REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/listings"));
        assert!(doc.paths.paths.contains_key("/subscriptions/capture-order"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
