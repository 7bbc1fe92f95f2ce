//! Error types for ABC Ledger services
//!
//! Every failure a handler can produce is an [`AppError`]. The error knows its
//! machine-readable code and HTTP status, and renders itself into the uniform
//! `{ "error": { code, message, details? } }` envelope. Server-side failures
//! are logged with their cause and shown to the caller as a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    BadRequest,
    Unauthorized,
    InvalidToken,
    ExpiredToken,
    Forbidden,
    NotFound,
    RateLimited,
    DatabaseError,
    InternalServerError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Request shape errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        details: Option<Value>,
    },

    #[error("{field} is required")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("{message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("{resource_type} not found")]
    NotFound { resource_type: String, id: String },

    // Rate limiting
    #[error("Rate limit exceeded")]
    RateLimited,

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // External collaborator errors
    #[error("Narrative generation failed: {message}")]
    Generation { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        let mut details = Map::new();
        details.insert(field.clone(), Value::Array(vec![Value::String(message.clone())]));

        AppError::Validation {
            message: format!("{}: {}", field, message),
            field: Some(field),
            details: Some(Value::Object(details)),
        }
    }

    /// Shorthand for a missing resource
    pub fn not_found(resource_type: impl Into<String>, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    /// Shorthand for an ownership violation
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } | AppError::InvalidFormat { .. } => ErrorCode::BadRequest,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Migration(_) => ErrorCode::DatabaseError,
            AppError::Generation { .. }
            | AppError::HttpClient(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => ErrorCode::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.code() {
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::DatabaseError | ErrorCode::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message shown to the caller. Server-side causes stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::DatabaseConnection { .. } | AppError::Migration(_) => {
                "Failed to complete database operation".to_string()
            }
            AppError::Generation { .. } => "Failed to generate session notes".to_string(),
            AppError::HttpClient(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => "Failed to process request".to_string(),
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation { details, .. } => details.clone(),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.public_message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Map::new();
        flatten_validation_errors("", &errors, &mut fields);

        let message = fields
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        AppError::Validation {
            message: format!("invalid fields: {}", message),
            field: fields.keys().next().cloned(),
            details: Some(Value::Object(fields)),
        }
    }
}

fn flatten_validation_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Map<String, Value>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = list
                    .iter()
                    .map(|e| {
                        let text = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        Value::String(text)
                    })
                    .collect();
                out.insert(path, Value::Array(messages));
            }
            ValidationErrorsKind::Struct(inner) => flatten_validation_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("Behavior", "abc");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Behavior not found");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation("name", "must not be empty");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert_eq!(err.details().unwrap()["name"][0], "must not be empty");
    }

    #[test]
    fn test_forbidden_keeps_message() {
        let err = AppError::forbidden("Global behaviors cannot be modified");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.public_message(), "Global behaviors cannot be modified");
    }

    #[test]
    fn test_server_error_hides_cause() {
        let err = AppError::Generation {
            message: "upstream returned 502: bad gateway".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ErrorCode::InternalServerError);
        assert!(err.is_server_error());
        assert!(!err.public_message().contains("502"));
    }

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    #[test]
    fn test_validator_errors_are_field_level() {
        let errors = Named { name: String::new() }.validate().unwrap_err();
        let err = AppError::from(errors);
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.details().unwrap()["name"][0], "name is required");
    }
}
