//! Business logic services.

pub mod anchor_service;
pub mod artifact_service;
pub mod audit_service;
pub mod comment_service;
pub mod content_store;
pub mod expert_review_service;
pub mod flag_service;
pub mod in_flight;
pub mod ledger_client;
pub mod lifecycle_service;
pub mod pinning_service;
pub mod proof;
pub mod review_sweeper;
pub mod scheduler_service;
pub mod stats_service;
pub mod vote_service;

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// 1-indexed page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if self.per_page < 1 || self.per_page > MAX_PER_PAGE {
            return Err(AppError::Validation(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }
}
