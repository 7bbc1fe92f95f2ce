//! API handlers module

pub mod catalog;
pub mod clients;
pub mod health;
pub mod notes;
pub mod sessions;

use abcledger_common::errors::AppError;
use axum::http::Uri;

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> AppError {
    AppError::not_found("Route", uri.path())
}
