use crate::entities::{listing_entity as listings, review_entity as reviews, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::user_service::find_user;
use crate::utils::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};

const MAX_COMMENT_CHARS: usize = 2000;

fn validate_review(request: &ReviewRequest) -> AppResult<String> {
    if !(1..=5).contains(&request.rating) {
        return Err(AppError::ValidationError(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    let comment = request.comment.trim();
    if comment.is_empty() {
        return Err(AppError::ValidationError("Comment is required".to_string()));
    }
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::ValidationError(format!(
            "Comment cannot exceed {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(comment.to_string())
}

fn already_reviewed() -> AppError {
    AppError::ValidationError("You have already reviewed this listing".to_string())
}

#[derive(Clone)]
pub struct ReviewService {
    pool: DatabaseConnection,
}

impl ReviewService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn find_review(&self, review_id: i32) -> AppResult<reviews::Model> {
        reviews::Entity::find_by_id(review_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }

    pub async fn add_review(
        &self,
        user_id: i32,
        listing_id: i32,
        request: ReviewRequest,
    ) -> AppResult<ReviewResponse> {
        let comment = validate_review(&request)?;
        let user = find_user(&self.pool, user_id).await?;
        if user.is_banned {
            return Err(AppError::Forbidden);
        }
        let listing = listings::Entity::find_by_id(listing_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;
        if listing.owner_id == user_id {
            return Err(AppError::Forbidden);
        }

        let existing = reviews::Entity::find()
            .filter(reviews::Column::UserId.eq(user_id))
            .filter(reviews::Column::ListingId.eq(listing_id))
            .count(&self.pool)
            .await?;
        if existing > 0 {
            return Err(already_reviewed());
        }

        let now = Utc::now();
        let review = reviews::ActiveModel {
            user_id: Set(user_id),
            listing_id: Set(listing_id),
            rating: Set(request.rating),
            comment: Set(comment),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => already_reviewed(),
            _ => AppError::from(err),
        })?;
        Ok(ReviewResponse::build(review, user.username))
    }

    pub async fn update_review(
        &self,
        review_id: i32,
        user_id: i32,
        request: ReviewRequest,
    ) -> AppResult<ReviewResponse> {
        let comment = validate_review(&request)?;
        let review = self.find_review(review_id).await?;
        if review.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        let user = find_user(&self.pool, user_id).await?;

        let mut am = review.into_active_model();
        am.rating = Set(request.rating);
        am.comment = Set(comment);
        am.updated_at = Set(Utc::now());
        let review = am.update(&self.pool).await?;
        Ok(ReviewResponse::build(review, user.username))
    }

    pub async fn delete_review(&self, review_id: i32, requester_id: i32) -> AppResult<()> {
        let review = self.find_review(review_id).await?;
        let requester = find_user(&self.pool, requester_id).await?;
        if review.user_id != requester_id && !is_admin(&requester) {
            return Err(AppError::Forbidden);
        }
        reviews::Entity::delete_by_id(review.id)
            .exec(&self.pool)
            .await?;
        Ok(())
    }

    /// Reviews of a listing, newest first.
    pub async fn list_reviews(&self, listing_id: i32) -> AppResult<Vec<ReviewResponse>> {
        let rows = reviews::Entity::find()
            .filter(reviews::Column::ListingId.eq(listing_id))
            .order_by_desc(reviews::Column::CreatedAt)
            .order_by_desc(reviews::Column::Id)
            .find_also_related(users::Entity)
            .all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(review, author)| {
                ReviewResponse::build(review, author.map(|u| u.username).unwrap_or_default())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SubscriptionTier, UserRole};
    use crate::services::ListingService;
    use crate::test_support::{TestContext, sale};

    fn request(rating: i32, comment: &str) -> ReviewRequest {
        ReviewRequest {
            rating,
            comment: comment.to_string(),
        }
    }

    #[tokio::test]
    async fn test_review_rules() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let buyer = ctx.create_user("buyer", UserRole::Customer).await;
        let admin = ctx.create_user("admin", UserRole::Admin).await;
        let listing = ListingService::new(ctx.db.clone(), ctx.shared_storage())
            .create_listing(seller.id, sale("Honda", "Jazz", 2016, 600_000), vec![])
            .await
            .unwrap();
        let svc = ReviewService::new(ctx.db.clone());

        assert!(matches!(
            svc.add_review(seller.id, listing.id, request(5, "Mine is great")).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            svc.add_review(buyer.id, listing.id, request(6, "Too good")).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            svc.add_review(buyer.id, listing.id, request(3, "   ")).await,
            Err(AppError::ValidationError(_))
        ));
        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(matches!(
            svc.add_review(buyer.id, listing.id, request(3, &long)).await,
            Err(AppError::ValidationError(_))
        ));

        let review = svc
            .add_review(buyer.id, listing.id, request(4, " Smooth ride "))
            .await
            .unwrap();
        assert_eq!(review.comment, "Smooth ride");
        assert_eq!(review.username, "buyer");
        assert!(matches!(
            svc.add_review(buyer.id, listing.id, request(2, "Again")).await,
            Err(AppError::ValidationError(_))
        ));

        let updated = svc
            .update_review(review.id, buyer.id, request(2, "Brakes squeak"))
            .await
            .unwrap();
        assert_eq!(updated.rating, 2);
        assert!(matches!(
            svc.update_review(review.id, admin.id, request(5, "Edited")).await,
            Err(AppError::Forbidden)
        ));

        assert_eq!(svc.list_reviews(listing.id).await.unwrap().len(), 1);
        svc.delete_review(review.id, admin.id).await.unwrap();
        assert!(svc.list_reviews(listing.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_reviews_keep_one() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let buyer = ctx.create_user("buyer", UserRole::Customer).await;
        let listing = ListingService::new(ctx.db.clone(), ctx.shared_storage())
            .create_listing(seller.id, sale("Mazda", "MX-5", 2018, 2_000_000), vec![])
            .await
            .unwrap();
        let svc = ReviewService::new(ctx.db.clone());

        let (a, b) = tokio::join!(
            svc.add_review(buyer.id, listing.id, request(5, "Great fun")),
            svc.add_review(buyer.id, listing.id, request(4, "Fun but loud")),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        for result in [a, b] {
            if let Err(err) = result {
                assert!(matches!(err, AppError::ValidationError(_)));
            }
        }
        assert_eq!(svc.list_reviews(listing.id).await.unwrap().len(), 1);
    }
}
