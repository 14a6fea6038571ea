//! Custom error types for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::{CacheError, DatabaseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the authentication service
#[derive(Error, Debug)]
pub enum AuthError {
    /// A required field is missing or empty
    #[error("Validation error: {0}")]
    Validation(String),

    /// Too many requests within the current window
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// A submitted one-time code did not verify
    #[error("Invalid code")]
    InvalidCode,

    /// Token signature or structure did not verify
    #[error("Invalid token")]
    InvalidToken,

    /// Token expiry has passed
    #[error("Token expired")]
    ExpiredToken,

    /// No valid session on a protected request
    #[error("Unauthorized")]
    Unauthorized,

    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The expiring store failed or timed out
    #[error("Store error: {0}")]
    Store(#[from] CacheError),

    /// The relational database failed
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(DatabaseError::Query(err))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            AuthError::InvalidCode => (StatusCode::UNAUTHORIZED, "Invalid code".to_string()),
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AuthError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AuthError::Store(_) | AuthError::Database(_) | AuthError::Internal(_) => {
                error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for authentication service results
pub type AuthResult<T> = Result<T, AuthError>;
