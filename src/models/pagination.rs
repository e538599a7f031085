//! Pagination parameters and page slicing for in-memory result sets.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self { page, page_size }
    }

    pub fn get_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_page_size(&self) -> u32 {
        self.page_size.unwrap_or(20).clamp(1, 100)
    }

    pub fn get_offset(&self) -> u64 {
        u64::from(self.get_page() - 1) * u64::from(self.get_page_size())
    }

    pub fn get_limit(&self) -> u64 {
        u64::from(self.get_page_size())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PaginationInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PaginationInfo {
    /// An empty result still reports one (empty) page.
    pub fn new(current_page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(u64::from(per_page.max(1))) as u32
        };

        Self {
            current_page,
            per_page,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, params: &PaginationParams, total: u64) -> Self {
        let pagination = PaginationInfo::new(params.get_page(), params.get_page_size(), total);
        Self { items, pagination }
    }
}

/// Slice one page out of a fully materialised list.
///
/// Pages below 1 are treated as page 1 and pages past the end as the last page.
pub fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> (Vec<T>, PaginationInfo) {
    let per_page = per_page.max(1);
    let total = items.len() as u64;
    let mut info = PaginationInfo::new(page.max(1), per_page, total);
    info.current_page = info.current_page.min(info.total_pages);

    let start = (info.current_page as usize - 1) * per_page as usize;
    let page_items = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    (page_items, info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams::new(Some(2), Some(10));
        assert_eq!(params.get_page(), 2);
        assert_eq!(params.get_page_size(), 10);
        assert_eq!(params.get_offset(), 10);
        assert_eq!(params.get_limit(), 10);
    }

    #[test]
    fn test_pagination_params_defaults() {
        let params = PaginationParams::new(None, None);
        assert_eq!(params.get_page(), 1);
        assert_eq!(params.get_page_size(), 20);
        assert_eq!(params.get_offset(), 0);
        assert_eq!(PaginationParams::new(Some(0), Some(500)).get_page_size(), 100);
    }

    #[test]
    fn test_pagination_info() {
        let info = PaginationInfo::new(2, 10, 25);
        assert_eq!(info.total_pages, 3);
        assert_eq!(PaginationInfo::new(1, 12, 0).total_pages, 1);
    }

    #[test]
    fn test_paginate_clamps_page() {
        let items: Vec<u32> = (1..=25).collect();

        let (page, info) = paginate(items.clone(), 3, 12);
        assert_eq!(page, vec![25]);
        assert_eq!(info.total_pages, 3);

        let (page, info) = paginate(items.clone(), 0, 12);
        assert_eq!(page.len(), 12);
        assert_eq!(info.current_page, 1);

        let (page, info) = paginate(items, 99, 12);
        assert_eq!(page, vec![25]);
        assert_eq!(info.current_page, 3);
    }

    #[test]
    fn test_paginate_empty() {
        let (page, info) = paginate(Vec::<u32>::new(), 4, 12);
        assert!(page.is_empty());
        assert_eq!(info.current_page, 1);
        assert_eq!(info.total, 0);
    }
}
