//! Pagination types shared by listing pages

use serde::{Deserialize, Serialize};

/// Page request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 6,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamping nonsense input
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Number of the last page; an empty listing still has page 1
    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 1;
        }
        let per_page = i64::from(self.per_page);
        let pages = (self.total + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Navigation data for the pagination partial
    pub fn pagination(&self) -> Pagination {
        Pagination {
            current_page: self.page,
            has_next_page: self.has_next(),
            has_previous_page: self.has_prev(),
            next_page: self.page.saturating_add(1),
            previous_page: self.page.saturating_sub(1),
            last_page: self.last_page(),
        }
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            per_page: 6,
        }
    }
}

/// Template-facing page navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page: u32,
    pub previous_page: u32,
    pub last_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn paged(total: i64, page: u32, per_page: u32) -> PagedResult<()> {
        PagedResult::new(Vec::new(), total, &ListParams::new(page, per_page))
    }

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams::new(0, 1000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }

    #[test]
    fn test_offset() {
        assert_eq!(ListParams::new(1, 6).offset(), 0);
        assert_eq!(ListParams::new(3, 6).offset(), 12);
    }

    #[test]
    fn test_empty_listing_has_one_page() {
        let result = paged(0, 1, 6);
        assert_eq!(result.last_page(), 1);
        assert!(!result.has_next());
        assert!(!result.has_prev());
    }

    #[test]
    fn test_pagination_middle_page() {
        let nav = paged(20, 2, 6).pagination();
        assert_eq!(
            nav,
            Pagination {
                current_page: 2,
                has_next_page: true,
                has_previous_page: true,
                next_page: 3,
                previous_page: 1,
                last_page: 4,
            }
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_last_page_is_ceiling(total in 1i64..10_000, per_page in 1u32..100) {
            let result = paged(total, 1, per_page);
            let expected = (total + i64::from(per_page) - 1) / i64::from(per_page);
            prop_assert_eq!(i64::from(result.last_page()), expected);
            prop_assert!(result.last_page() >= 1);
        }

        #[test]
        fn prop_last_page_has_no_next(total in 0i64..10_000, per_page in 1u32..100) {
            let last = paged(total, 1, per_page).last_page();
            let result = paged(total, last, per_page);
            prop_assert!(!result.has_next());
        }
    }
}
