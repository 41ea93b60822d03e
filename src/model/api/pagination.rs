use serde::{Deserialize, Serialize};

/// Pagination parameters, taken from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromForm, UriDisplayQuery, Serialize, Deserialize)]
pub struct PaginationRequest {
    /// 1-based page number.
    #[field(default = 1, validate = range(1..))]
    pub page_num: u64,
    #[field(default = 50, validate = range(1..=500))]
    pub page_size: u64,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 50,
        }
    }
}

impl PaginationRequest {
    /// How many items precede the requested page.
    pub fn skip(&self) -> u64 {
        // The server reads skip as a signed 64-bit value.
        self.page_num
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .min(i64::MAX as u64)
    }

    /// Limit for the database query.
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    /// Wrap one page of items with its pagination metadata.
    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u64,
    pub page_size: u64,
    /// Total number of items across all pages.
    pub total: u64,
}

/// A page of items.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub pagination: PaginationResult,
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{json, serde_json};

    use super::*;

    #[test]
    fn skip_counts_preceding_pages() {
        let first = PaginationRequest {
            page_num: 1,
            page_size: 20,
        };
        assert_eq!(first.skip(), 0);
        let third = PaginationRequest {
            page_num: 3,
            page_size: 20,
        };
        assert_eq!(third.skip(), 40);
    }

    #[test]
    fn skip_saturates_for_huge_pages() {
        let huge = PaginationRequest {
            page_num: u64::MAX / 100,
            page_size: 500,
        };
        assert_eq!(huge.skip(), i64::MAX as u64);
    }

    #[test]
    fn metadata_is_flattened() {
        let page = PaginationRequest::default().to_paginated(3, vec![1, 2, 3]);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"items": [1, 2, 3], "page_num": 1, "page_size": 50, "total": 3})
        );
    }
}
