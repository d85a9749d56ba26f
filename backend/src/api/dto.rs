//! Shared Data Transfer Objects (DTOs) for API handlers.
//!
//! Common pagination structs used by every list endpoint.

use serde::{Deserialize, Serialize};

use crate::services::{PageRequest, DEFAULT_PER_PAGE};
use crate::store::Page;

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Total number of items across all pages
    pub total: i64,
    /// Total number of pages
    pub total_pages: u32,
}

impl Pagination {
    /// Create pagination from query parameters and total count.
    pub fn from_query_and_total(query: &PaginationQuery, total: i64) -> Self {
        let page = query.page();
        let per_page = query.per_page();
        let total_pages = if total == 0 || per_page == 0 {
            0
        } else {
            ((total as f64) / (per_page as f64)).ceil() as u32
        };

        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

/// Query parameters for paginated list requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: 20)
    pub per_page: Option<u32>,
}

impl PaginationQuery {
    /// Get the page number, defaulting to 1 if not specified.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Get the per_page value, defaulting to 20 if not specified.
    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn to_page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

/// A page of items with its pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn new(page: Page<T>, query: &PaginationQuery) -> Self {
        Self {
            pagination: Pagination::from_query_and_total(query, page.total),
            items: page.items,
        }
    }
}
