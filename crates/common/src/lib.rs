//! ABC Ledger Common Library
//!
//! Shared code for the ABC Ledger gateway including:
//! - Catalog, client, session and notes domain services
//! - Database models, the Postgres repository and an in-memory store
//! - Narrative generator abstraction
//! - Error types and the response envelope
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod api;
pub mod auth;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod notes;
pub mod sessions;
pub mod store;

// Re-export commonly used types
pub use api::{ApiResponse, Page, Pagination};
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use notes::NarrativeGenerator;
pub use store::{MemoryStore, Store};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
