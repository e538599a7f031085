use crate::entities::{
    ListingState, PaymentOrderStatus, SubscriptionStatus, SubscriptionTier, listing_entity as listings,
    payment_order_entity as payment_orders, subscription_plan_entity as plans,
    user_subscription_entity as subs,
};
use crate::error::{AppError, AppResult};
use crate::external::{CAPTURE_COMPLETED, PayPalService};
use crate::models::*;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

/// Length of one paid (or free) subscription period.
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

#[derive(Clone)]
pub struct SubscriptionService {
    pool: DatabaseConnection,
    paypal: PayPalService,
}

/// Highest-tier subscription that is active at `now`; later end date breaks ties.
pub(crate) async fn find_active_subscription<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    now: DateTime<Utc>,
) -> AppResult<Option<ActiveSubscription>> {
    let rows = subs::Entity::find()
        .filter(subs::Column::UserId.eq(user_id))
        .filter(subs::Column::Status.eq(SubscriptionStatus::Active))
        .find_also_related(plans::Entity)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(sub, plan)| plan.map(|plan| (sub, plan)))
        .filter(|(sub, _)| sub.is_active_at(now))
        .max_by_key(|(sub, plan)| (plan.tier, sub.end_date))
        .map(|(subscription, plan)| ActiveSubscription { subscription, plan }))
}

/// Owned listings still on the market; sold, rented and hidden ones free their slot.
async fn count_active_owned<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    featured_only: bool,
) -> AppResult<u64> {
    let mut query = listings::Entity::find()
        .filter(listings::Column::OwnerId.eq(user_id))
        .filter(listings::Column::State.eq(ListingState::Available));
    if featured_only {
        query = query.filter(listings::Column::IsFeatured.eq(true));
    }
    Ok(query.count(conn).await?)
}

/// Quota check for one more listing (and one more featured slot when requested).
pub(crate) async fn check_listing_quota<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    wants_featured: bool,
    now: DateTime<Utc>,
) -> AppResult<QuotaCheck> {
    let Some(active) = find_active_subscription(conn, user_id, now).await? else {
        return Ok(QuotaCheck::Denied(QuotaDenial::NoActiveSubscription));
    };
    let plan = active.plan;

    let listing_count = count_active_owned(conn, user_id, false).await?;
    if listing_count >= plan.max_listings.max(0) as u64 {
        return Ok(QuotaCheck::Denied(QuotaDenial::ListingLimitExceeded {
            limit: plan.max_listings,
        }));
    }
    if wants_featured {
        return check_feature_slot_with(conn, user_id, &plan).await;
    }
    Ok(QuotaCheck::Allowed)
}

/// Quota check for turning the featured flag on for an existing listing.
pub(crate) async fn check_feature_slot<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    now: DateTime<Utc>,
) -> AppResult<QuotaCheck> {
    match find_active_subscription(conn, user_id, now).await? {
        Some(active) => check_feature_slot_with(conn, user_id, &active.plan).await,
        None => Ok(QuotaCheck::Denied(QuotaDenial::NoActiveSubscription)),
    }
}

async fn check_feature_slot_with<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    plan: &plans::Model,
) -> AppResult<QuotaCheck> {
    let featured_count = count_active_owned(conn, user_id, true).await?;
    if featured_count >= plan.max_featured.max(0) as u64 {
        return Ok(QuotaCheck::Denied(QuotaDenial::FeatureSlotExceeded {
            limit: plan.max_featured,
        }));
    }
    Ok(QuotaCheck::Allowed)
}

impl SubscriptionService {
    pub fn new(pool: DatabaseConnection, paypal: PayPalService) -> Self {
        Self { pool, paypal }
    }

    pub async fn get_active_subscription(
        &self,
        user_id: i32,
    ) -> AppResult<Option<ActiveSubscription>> {
        find_active_subscription(&self.pool, user_id, Utc::now()).await
    }

    pub async fn validate_car_creation(
        &self,
        user_id: i32,
        wants_featured: bool,
    ) -> AppResult<QuotaCheck> {
        check_listing_quota(&self.pool, user_id, wants_featured, Utc::now()).await
    }

    pub async fn list_plans(&self) -> AppResult<Vec<PlanResponse>> {
        let mut rows = plans::Entity::find().all(&self.pool).await?;
        rows.sort_by_key(|p| p.tier);
        Ok(rows.into_iter().map(PlanResponse::from).collect())
    }

    async fn find_plan(&self, plan_id: i32) -> AppResult<plans::Model> {
        plans::Entity::find_by_id(plan_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription plan not found".to_string()))
    }

    /// Subscription history, newest first.
    pub async fn get_user_subscriptions(
        &self,
        user_id: i32,
    ) -> AppResult<Vec<UserSubscriptionResponse>> {
        let now = Utc::now();
        let rows = subs::Entity::find()
            .filter(subs::Column::UserId.eq(user_id))
            .order_by_desc(subs::Column::StartDate)
            .find_also_related(plans::Entity)
            .all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(sub, plan)| plan.map(|plan| UserSubscriptionResponse::build(sub, plan, now)))
            .collect())
    }

    pub async fn get_quota_usage(&self, user_id: i32) -> AppResult<QuotaUsageResponse> {
        let active = self.get_active_subscription(user_id).await?;
        let listing_count = count_active_owned(&self.pool, user_id, false).await?;
        let featured_count = count_active_owned(&self.pool, user_id, true).await?;
        let (max_listings, max_featured) = active
            .as_ref()
            .map(|a| (a.plan.max_listings, a.plan.max_featured))
            .unwrap_or((0, 0));
        Ok(QuotaUsageResponse {
            plan: active.map(|a| PlanResponse::from(a.plan)),
            listing_count,
            featured_count,
            max_listings,
            max_featured,
        })
    }

    /// Record a paid subscription. Calling again with the same external order id
    /// returns the subscription created the first time.
    pub async fn complete_subscription_purchase(
        &self,
        user_id: i32,
        plan_id: i32,
        external_order_id: &str,
    ) -> AppResult<UserSubscriptionResponse> {
        let plan = self.find_plan(plan_id).await?;
        if let Some(existing) = self.find_by_external_order(external_order_id).await? {
            return self.existing_purchase(existing, user_id);
        }

        let now = Utc::now();
        let inserted = subs::ActiveModel {
            user_id: Set(user_id),
            plan_id: Set(plan.id),
            start_date: Set(now),
            end_date: Set(now + Duration::days(SUBSCRIPTION_PERIOD_DAYS)),
            status: Set(SubscriptionStatus::Active),
            external_order_id: Set(Some(external_order_id.to_string())),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(sub) => {
                log::info!(
                    "User {user_id} subscribed to {} until {} (order {external_order_id})",
                    plan.tier,
                    sub.end_date
                );
                Ok(UserSubscriptionResponse::build(sub, plan, now))
            }
            // lost a race on the unique order id
            Err(e) => match self.find_by_external_order(external_order_id).await? {
                Some(existing) => self.existing_purchase(existing, user_id),
                None => Err(e.into()),
            },
        }
    }

    async fn find_by_external_order(
        &self,
        external_order_id: &str,
    ) -> AppResult<Option<(subs::Model, plans::Model)>> {
        let row = subs::Entity::find()
            .filter(subs::Column::ExternalOrderId.eq(external_order_id))
            .find_also_related(plans::Entity)
            .one(&self.pool)
            .await?;
        Ok(row.and_then(|(sub, plan)| plan.map(|plan| (sub, plan))))
    }

    fn existing_purchase(
        &self,
        (sub, plan): (subs::Model, plans::Model),
        user_id: i32,
    ) -> AppResult<UserSubscriptionResponse> {
        if sub.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        Ok(UserSubscriptionResponse::build(sub, plan, Utc::now()))
    }

    /// Start a free-tier period for a user with no active subscription.
    pub async fn activate_free_plan(&self, user_id: i32) -> AppResult<UserSubscriptionResponse> {
        let now = Utc::now();
        if find_active_subscription(&self.pool, user_id, now)
            .await?
            .is_some()
        {
            return Err(AppError::ValidationError(
                "An active subscription already exists".to_string(),
            ));
        }
        let plan = plans::Entity::find()
            .filter(plans::Column::Tier.eq(SubscriptionTier::Free))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Free plan not found".to_string()))?;

        let sub = subs::ActiveModel {
            user_id: Set(user_id),
            plan_id: Set(plan.id),
            start_date: Set(now),
            end_date: Set(now + Duration::days(SUBSCRIPTION_PERIOD_DAYS)),
            status: Set(SubscriptionStatus::Active),
            external_order_id: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(UserSubscriptionResponse::build(sub, plan, now))
    }

    pub async fn create_payment_order(
        &self,
        user_id: i32,
        request: CreateOrderRequest,
    ) -> AppResult<CreateOrderResponse> {
        let plan = self.find_plan(request.plan_id).await?;
        if plan.monthly_price <= 0 {
            return Err(AppError::ValidationError(
                "This plan does not require payment".to_string(),
            ));
        }
        if let Some(amount) = request.amount
            && amount != plan.monthly_price
        {
            return Err(AppError::ValidationError(format!(
                "Amount {amount} does not match the {} plan price",
                plan.tier
            )));
        }

        let order_id = self.paypal.create_order(plan.monthly_price).await?;
        let now = Utc::now();
        payment_orders::ActiveModel {
            external_order_id: Set(order_id.clone()),
            user_id: Set(user_id),
            plan_id: Set(plan.id),
            amount: Set(plan.monthly_price),
            currency: Set(self.paypal.currency().to_string()),
            status: Set(PaymentOrderStatus::Created),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("User {user_id} opened PayPal order {order_id} for plan {}", plan.tier);
        Ok(CreateOrderResponse { id: order_id })
    }

    pub async fn capture_payment_order(
        &self,
        user_id: i32,
        request: CaptureOrderRequest,
    ) -> AppResult<UserSubscriptionResponse> {
        let order = payment_orders::Entity::find()
            .filter(payment_orders::Column::ExternalOrderId.eq(request.order_id.as_str()))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment order not found".to_string()))?;
        if order.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        if order.plan_id != request.plan_id {
            return Err(AppError::ValidationError(
                "Order was created for a different plan".to_string(),
            ));
        }

        match order.status {
            PaymentOrderStatus::Completed => {
                return self
                    .complete_subscription_purchase(user_id, order.plan_id, &order.external_order_id)
                    .await;
            }
            PaymentOrderStatus::Failed => {
                return Err(AppError::ValidationError(
                    "Payment order already failed".to_string(),
                ));
            }
            PaymentOrderStatus::Created => {}
        }

        let status = self.paypal.capture_order(&order.external_order_id).await?;
        let plan_id = order.plan_id;
        let external_order_id = order.external_order_id.clone();

        if status != CAPTURE_COMPLETED {
            let mut am = order.into_active_model();
            am.status = Set(PaymentOrderStatus::Failed);
            am.updated_at = Set(Utc::now());
            am.update(&self.pool).await?;
            log::warn!("PayPal order {external_order_id} captured with status {status}");
            return Err(AppError::ExternalApiError(format!(
                "Payment not completed: {status}"
            )));
        }

        let mut am = order.into_active_model();
        am.status = Set(PaymentOrderStatus::Completed);
        am.updated_at = Set(Utc::now());
        am.update(&self.pool).await?;

        self.complete_subscription_purchase(user_id, plan_id, &external_order_id)
            .await
    }

    /// Mark active subscriptions past their end date as expired. Returns the number of rows changed.
    pub async fn expire_subscriptions(&self) -> AppResult<u64> {
        let now = Utc::now();
        let expired_ids: Vec<i32> = subs::Entity::find()
            .filter(subs::Column::Status.eq(SubscriptionStatus::Active))
            .all(&self.pool)
            .await?
            .into_iter()
            .filter(|s| s.end_date < now)
            .map(|s| s.id)
            .collect();
        if expired_ids.is_empty() {
            return Ok(0);
        }

        let result = subs::Entity::update_many()
            .col_expr(subs::Column::Status, Expr::value(SubscriptionStatus::Expired))
            .filter(subs::Column::Id.is_in(expired_ids))
            .exec(&self.pool)
            .await?;
        if result.rows_affected > 0 {
            log::info!("Expired {} subscriptions", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayPalConfig;
    use crate::entities::UserRole;
    use crate::test_support::TestContext;

    fn paypal(base_url: String) -> PayPalService {
        PayPalService::new(PayPalConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            base_url,
            currency: "USD".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn service(ctx: &TestContext) -> SubscriptionService {
        SubscriptionService::new(ctx.db.clone(), paypal("http://127.0.0.1:9".to_string()))
    }

    async fn insert_listing(ctx: &TestContext, owner_id: i32, featured: bool) {
        let now = Utc::now();
        let car = crate::entities::car_entity::ActiveModel {
            manufacturer: Set("Mazda".into()),
            model: Set("3".into()),
            year: Set(2020),
            body_style: Set("Hatchback".into()),
            fuel_type: Set(crate::entities::FuelType::Petrol),
            transmission: Set(crate::entities::Transmission::Manual),
            horsepower: Set(120),
            doors: Set(5),
            ..Default::default()
        }
        .insert(&ctx.db)
        .await
        .unwrap();
        listings::ActiveModel {
            car_id: Set(car.id),
            owner_id: Set(owner_id),
            listing_type: Set(crate::entities::ListingType::ForSelling),
            rent_price: Set(0),
            new_price: Set(1_000_000),
            old_price: Set(None),
            description: Set(String::new()),
            color: Set("red".into()),
            state: Set(ListingState::Available),
            is_featured: Set(featured),
            discount: Set(0),
            views: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&ctx.db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_no_subscription_is_denied() {
        let ctx = TestContext::new().await;
        let user = ctx.create_user("nosub", UserRole::Provider).await;
        let check = service(&ctx).validate_car_creation(user.id, false).await.unwrap();
        assert_eq!(check, QuotaCheck::Denied(QuotaDenial::NoActiveSubscription));
    }

    #[tokio::test]
    async fn test_listing_and_feature_limits() {
        let ctx = TestContext::new().await;
        let user = ctx.provider("starter", SubscriptionTier::Starter).await;
        let svc = service(&ctx);

        assert!(svc.validate_car_creation(user.id, true).await.unwrap().is_allowed());
        insert_listing(&ctx, user.id, true).await;
        assert_eq!(
            svc.validate_car_creation(user.id, true).await.unwrap(),
            QuotaCheck::Denied(QuotaDenial::FeatureSlotExceeded { limit: 1 })
        );
        assert!(svc.validate_car_creation(user.id, false).await.unwrap().is_allowed());

        for _ in 0..4 {
            insert_listing(&ctx, user.id, false).await;
        }
        assert_eq!(
            svc.validate_car_creation(user.id, false).await.unwrap(),
            QuotaCheck::Denied(QuotaDenial::ListingLimitExceeded { limit: 5 })
        );

        let usage = svc.get_quota_usage(user.id).await.unwrap();
        assert_eq!(usage.listing_count, 5);
        assert_eq!(usage.featured_count, 1);
        assert_eq!(usage.max_listings, 5);
    }

    #[tokio::test]
    async fn test_highest_tier_wins() {
        let ctx = TestContext::new().await;
        let user = ctx.provider("multi", SubscriptionTier::Starter).await;
        ctx.subscribe(user.id, SubscriptionTier::Pro).await;
        let active = service(&ctx)
            .get_active_subscription(user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.plan.tier, SubscriptionTier::Pro);
    }

    #[tokio::test]
    async fn test_expired_window_is_not_active() {
        let ctx = TestContext::new().await;
        let user = ctx.create_user("lapsed", UserRole::Provider).await;
        let sub = ctx.subscribe(user.id, SubscriptionTier::Pro).await;
        let mut am = sub.into_active_model();
        am.end_date = Set(Utc::now() - Duration::days(1));
        am.update(&ctx.db).await.unwrap();

        let svc = service(&ctx);
        assert!(svc.get_active_subscription(user.id).await.unwrap().is_none());
        assert_eq!(svc.expire_subscriptions().await.unwrap(), 1);
        assert_eq!(svc.expire_subscriptions().await.unwrap(), 0);
        let history = svc.get_user_subscriptions(user.id).await.unwrap();
        assert_eq!(history[0].status, SubscriptionStatus::Expired);
        assert!(!history[0].is_active);
    }

    #[tokio::test]
    async fn test_purchase_completion_is_idempotent() {
        let ctx = TestContext::new().await;
        let user = ctx.create_user("buyer", UserRole::Provider).await;
        let plan = ctx.plan(SubscriptionTier::Pro).await;
        let svc = service(&ctx);

        let first = svc
            .complete_subscription_purchase(user.id, plan.id, "ORDER-9")
            .await
            .unwrap();
        let second = svc
            .complete_subscription_purchase(user.id, plan.id, "ORDER-9")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(svc.get_user_subscriptions(user.id).await.unwrap().len(), 1);
        assert_eq!(
            (first.end_date - first.start_date).num_days(),
            SUBSCRIPTION_PERIOD_DAYS
        );

        let other = ctx.create_user("other", UserRole::Provider).await;
        assert!(matches!(
            svc.complete_subscription_purchase(other.id, plan.id, "ORDER-9").await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_activate_free_plan_once() {
        let ctx = TestContext::new().await;
        let user = ctx.create_user("freebie", UserRole::Provider).await;
        let svc = service(&ctx);
        let sub = svc.activate_free_plan(user.id).await.unwrap();
        assert_eq!(sub.plan.tier, SubscriptionTier::Free);
        assert!(matches!(
            svc.activate_free_plan(user.id).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_plans_ordered_by_tier() {
        let ctx = TestContext::new().await;
        let tiers: Vec<_> = service(&ctx)
            .list_plans()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.tier)
            .collect();
        assert_eq!(
            tiers,
            vec![
                SubscriptionTier::Free,
                SubscriptionTier::Starter,
                SubscriptionTier::Pro,
                SubscriptionTier::Elite
            ]
        );
    }

    async fn mock_paypal(server: &mut mockito::Server, capture_status: &str) {
        server
            .mock("POST", "/v1/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"TOKEN","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v2/checkout/orders")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"PP-1","status":"CREATED"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v2/checkout/orders/PP-1/capture")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"id":"PP-1","status":"{capture_status}"}}"#))
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_order_flow_creates_subscription() {
        let mut server = mockito::Server::new_async().await;
        mock_paypal(&mut server, "COMPLETED").await;
        let ctx = TestContext::new().await;
        let user = ctx.create_user("payer", UserRole::Provider).await;
        let plan = ctx.plan(SubscriptionTier::Starter).await;
        let svc = SubscriptionService::new(ctx.db.clone(), paypal(server.url()));

        let wrong_amount = svc
            .create_payment_order(
                user.id,
                CreateOrderRequest {
                    plan_id: plan.id,
                    amount: Some(1),
                },
            )
            .await;
        assert!(matches!(wrong_amount, Err(AppError::ValidationError(_))));

        let order = svc
            .create_payment_order(
                user.id,
                CreateOrderRequest {
                    plan_id: plan.id,
                    amount: Some(plan.monthly_price),
                },
            )
            .await
            .unwrap();
        assert_eq!(order.id, "PP-1");

        let capture = CaptureOrderRequest {
            order_id: order.id.clone(),
            plan_id: plan.id,
        };
        let sub = svc.capture_payment_order(user.id, capture.clone()).await.unwrap();
        assert_eq!(sub.plan.tier, SubscriptionTier::Starter);
        assert!(sub.is_active);

        // completed orders do not hit PayPal again
        let again = svc.capture_payment_order(user.id, capture).await.unwrap();
        assert_eq!(again.id, sub.id);

        let stranger = ctx.create_user("stranger", UserRole::Provider).await;
        let stolen = svc
            .capture_payment_order(
                stranger.id,
                CaptureOrderRequest {
                    order_id: order.id,
                    plan_id: plan.id,
                },
            )
            .await;
        assert!(matches!(stolen, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_incomplete_capture_marks_order_failed() {
        let mut server = mockito::Server::new_async().await;
        mock_paypal(&mut server, "PAYER_ACTION_REQUIRED").await;
        let ctx = TestContext::new().await;
        let user = ctx.create_user("declined", UserRole::Provider).await;
        let plan = ctx.plan(SubscriptionTier::Pro).await;
        let svc = SubscriptionService::new(ctx.db.clone(), paypal(server.url()));

        let order = svc
            .create_payment_order(
                user.id,
                CreateOrderRequest {
                    plan_id: plan.id,
                    amount: None,
                },
            )
            .await
            .unwrap();
        let result = svc
            .capture_payment_order(
                user.id,
                CaptureOrderRequest {
                    order_id: order.id,
                    plan_id: plan.id,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ExternalApiError(_))));

        let stored = payment_orders::Entity::find()
            .one(&ctx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentOrderStatus::Failed);
        assert!(svc.get_active_subscription(user.id).await.unwrap().is_none());
    }
}
