use crate::models::{ListingCard, PaginationInfo, SortBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const HISTORY_PAGE_SIZE: u32 = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryItem {
    /// history row id, used by the remove endpoint
    pub id: i32,
    pub viewed_at: DateTime<Utc>,
    pub listing: ListingCard,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub items: Vec<HistoryItem>,
    pub pagination: PaginationInfo,
    pub sort_by: SortBy,
}
