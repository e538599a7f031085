use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The `error` object of every failed response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    #[schema(example = "LISTING_LIMIT_EXCEEDED")]
    pub code: String,
    pub message: String,
}
