use crate::entities::review_entity as reviews;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewRequest {
    #[schema(example = 5)]
    pub rating: i32,
    #[schema(example = "Clean car, honest seller.")]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub listing_id: i32,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewResponse {
    pub fn build(review: reviews::Model, username: String) -> Self {
        Self {
            id: review.id,
            user_id: review.user_id,
            username,
            listing_id: review.listing_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// Mean of the given ratings, 0.0 when there are none.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    sum as f64 / ratings.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[4, 5]), 4.5);
    }
}
