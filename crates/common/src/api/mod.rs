//! Success envelope shared by every endpoint
//!
//! Successful responses carry `{ "data": ..., "pagination"?: ... }`; errors
//! carry `{ "error": ... }` (see [`crate::errors`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use validator::ValidationError;

/// Field rule for names: whitespace alone does not count as a value
pub fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

/// Keeps an explicit `null` apart from an absent field. Pair with
/// `#[serde(default)]` so absence yields `None`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Paging metadata for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }

    /// Row offset of the first item on this page
    pub fn offset(page: u64, limit: u64) -> u64 {
        page.saturating_sub(1).saturating_mul(limit)
    }

    /// `LIMIT`/`OFFSET` bind values. Postgres takes signed 64-bit counts,
    /// so offsets past `i64::MAX` pin there and select nothing.
    pub fn sql_window(page: u64, limit: u64) -> (i64, i64) {
        let clamp = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
        (clamp(limit), clamp(Self::offset(page, limit)))
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,

    pub data: T,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
            pagination: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
            pagination: None,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        Self {
            status: StatusCode::OK,
            data: page.items,
            pagination: Some(page.pagination),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).total_pages, 2);
        assert_eq!(Pagination::new(3, 1, 3).total_pages, 3);
    }

    #[test]
    fn test_non_blank() {
        assert!(non_blank("Elopement").is_ok());
        assert!(non_blank("  x ").is_ok());
        assert!(non_blank("").is_err());
        assert!(non_blank(" \t\n").is_err());
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::offset(1, 25), 0);
        assert_eq!(Pagination::offset(3, 25), 50);
        assert_eq!(Pagination::offset(u64::MAX, 100), u64::MAX);
    }

    #[test]
    fn test_sql_window_never_goes_negative() {
        assert_eq!(Pagination::sql_window(3, 25), (25, 50));
        assert_eq!(Pagination::sql_window(100_000_000_000_000_000, 100), (100, i64::MAX));
        assert_eq!(Pagination::sql_window(u64::MAX, u64::MAX), (i64::MAX, i64::MAX));
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::page(Page {
            items: vec![1, 2],
            pagination: Pagination::new(1, 2, 5),
        }))
        .unwrap();

        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert_eq!(body["pagination"]["totalPages"], 3);
        assert!(body.get("status").is_none());
    }
}
