use serde::{Deserialize, Serialize};

use crate::domain::Post;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page number (1-indexed) and page size for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl PageQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn first(limit: u32) -> Self {
        Self::new(1, limit)
    }

    pub fn next(&self) -> Self {
        Self::new(self.page + 1, self.limit)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    /// Derive the page count and navigation flags from the item total.
    pub fn from_totals(current_page: u32, limit: u32, total_items: u64) -> Self {
        let current_page = current_page.max(1);
        let limit = limit.max(1);
        let total_pages = total_items.div_ceil(u64::from(limit)) as u32;

        Self {
            current_page,
            limit,
            total_items,
            total_pages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        }
    }
}

/// One normalized page as returned by a feed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub items: Vec<Post>,
    pub pagination: PageMeta,
}

impl PageResult {
    /// Count sent back to the server as the `X-Last-Count` hint.
    pub fn last_count(&self) -> u64 {
        self.pagination.total_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_clamps() {
        assert_eq!(PageQuery::new(0, 0), PageQuery { page: 1, limit: 1 });
        assert_eq!(PageQuery::new(3, 500).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_meta_from_totals() {
        let meta = PageMeta::from_totals(1, 10, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(!meta.has_prev);

        let last = PageMeta::from_totals(3, 10, 25);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn test_meta_empty_collection() {
        let meta = PageMeta::from_totals(1, 10, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
    }
}
