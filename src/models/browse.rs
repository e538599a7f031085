use crate::entities::{FuelType, ListingType, Transmission};
use crate::models::{ListingCard, PaginationInfo};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Fixed page size of the public listing browser.
pub const BROWSE_PAGE_SIZE: u32 = 12;

/// Sort vocabulary shared by browsing and view history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    HighestRated,
    MostViewed,
}

impl SortBy {
    /// Unknown or missing values fall back to `Newest`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("price_asc") => SortBy::PriceAsc,
            Some("price_desc") => SortBy::PriceDesc,
            Some("highest_rated") => SortBy::HighestRated,
            Some("most_viewed") => SortBy::MostViewed,
            _ => SortBy::Newest,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BrowseQuery {
    pub search: Option<String>,
    /// cents
    pub min_price: Option<i64>,
    /// cents
    pub max_price: Option<i64>,
    pub year: Option<i32>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
    pub listing_type: Option<ListingType>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BrowseResponse {
    pub items: Vec<ListingCard>,
    pub pagination: PaginationInfo,
    pub sort_by: SortBy,
    /// Distinct manufacturers over all browsable listings, alphabetical.
    pub manufacturers: Vec<String>,
    /// Distinct model years over all browsable listings, newest first.
    pub years: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_from_param() {
        assert_eq!(SortBy::from_param(Some("price_asc")), SortBy::PriceAsc);
        assert_eq!(SortBy::from_param(Some(" Most_Viewed ")), SortBy::MostViewed);
        assert_eq!(SortBy::from_param(Some("cheapest")), SortBy::Newest);
        assert_eq!(SortBy::from_param(None), SortBy::Newest);
    }
}
