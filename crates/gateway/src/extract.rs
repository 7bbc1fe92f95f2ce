//! Extractors that render framework rejections in the error envelope

use abcledger_common::errors::AppError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

/// JSON request body
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(json_rejection)
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(err) => AppError::Validation {
            message: err.body_text(),
            field: None,
            details: None,
        },
        JsonRejection::JsonSyntaxError(_) => AppError::InvalidFormat {
            message: "Request body is not valid JSON".to_string(),
        },
        JsonRejection::MissingJsonContentType(_) => AppError::InvalidFormat {
            message: "Expected Content-Type: application/json".to_string(),
        },
        other => AppError::InvalidFormat {
            message: other.body_text(),
        },
    }
}

/// Query string parameters
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection: QueryRejection| AppError::Validation {
                message: rejection.body_text(),
                field: None,
                details: None,
            })
    }
}

/// Path identifiers
pub struct PathIds<T>(pub T);

impl<S, T> FromRequestParts<S> for PathIds<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection: PathRejection| {
                tracing::debug!(error = %rejection.body_text(), "Rejected path parameters");
                AppError::InvalidFormat {
                    message: "Invalid id".to_string(),
                }
            })
    }
}
