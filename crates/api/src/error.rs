//! API error types with HTTP response mapping.

use auth::AuthError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ShopError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Shop operation failed.
    Shop(ShopError),
    /// Authentication or account operation failed.
    Auth(AuthError),
    /// No session token was presented.
    Unauthenticated,
    /// The static API key was missing or wrong.
    InvalidApiKey,
    /// The request could not be decoded.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    /// Returns the status code, stable reason and client-facing message.
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Shop(err) => shop_error_parts(err),
            ApiError::Auth(err) => auth_error_parts(err),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "authentication required".to_string(),
            ),
            ApiError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                "missing or invalid API key".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_failed", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "internal server error".to_string(),
    )
}

fn shop_error_parts(err: ShopError) -> (StatusCode, &'static str, String) {
    let reason = err.reason();
    match &err {
        ShopError::NotFound { .. } => (StatusCode::NOT_FOUND, reason, err.to_string()),
        ShopError::Conflict { .. }
        | ShopError::InsufficientStock { .. }
        | ShopError::Validation(_) => (StatusCode::BAD_REQUEST, reason, err.to_string()),
        ShopError::StorageUnavailable(source) => {
            tracing::error!(error = %source, "storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                reason,
                "storage temporarily unavailable, retry later".to_string(),
            )
        }
        ShopError::Internal(msg) => {
            tracing::error!(error = %msg, "internal shop error");
            internal()
        }
    }
}

fn auth_error_parts(err: AuthError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", message),
        AuthError::Expired => (StatusCode::UNAUTHORIZED, "token_expired", message),
        AuthError::InactiveAccount => (StatusCode::FORBIDDEN, "inactive_account", message),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", message),
        AuthError::InvalidCredentials => {
            (StatusCode::BAD_REQUEST, "invalid_credentials", message)
        }
        AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed", message),
        AuthError::Store(store_err) => shop_error_parts(ShopError::from(store_err)),
        AuthError::Hashing(msg) => {
            tracing::error!(error = %msg, "credential processing failed");
            internal()
        }
    }
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        ApiError::Shop(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}
