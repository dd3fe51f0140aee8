//! Common API utilities and shared types

use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::ReservationStatus;

/// Default page number (1-indexed)
fn default_page() -> i64 {
    1
}

/// Default page size
fn default_size() -> i64 {
    10
}

/// Largest accepted page size
const MAX_PAGE_SIZE: i64 = 100;

/// Pagination and status-filter query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    #[serde(default)]
    pub status: Option<String>,
}

impl ListQuery {
    /// Clamp page/size into their valid ranges.
    pub fn normalized(&self) -> (i64, i64) {
        (self.page.max(1), self.size.clamp(1, MAX_PAGE_SIZE))
    }

    /// Parse the optional status filter; an unknown value is a 400.
    pub fn status_filter(&self) -> Result<Option<ReservationStatus>, ApiError> {
        match self.status.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation_error(format!("Unknown status filter: {}", raw))),
        }
    }
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
}

/// Unread-count badge response
#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}
