//! Application error types with Axum response mapping.
//!
//! Each variant maps to a specific HTTP status + JSON body. Login failures
//! of every kind share one generic body so callers cannot tell which check
//! failed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::login::GENERIC_FAILURE;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No usable session. The reason is `no_session` or `session_error`.
    #[error("Not authenticated ({0})")]
    NotAuthenticated(&'static str),

    #[error("Insufficient role")]
    Forbidden,

    #[error("CSRF validation failed")]
    CsrfFailed,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("No refresh token")]
    NoRefreshToken,

    #[error("Refresh failed")]
    RefreshFailed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_body(&self) -> (StatusCode, serde_json::Value) {
        match self {
            AppError::NotAuthenticated(reason) => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Not authenticated", "reason": reason}),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({"error": "Forbidden", "message": "Insufficient role for this resource"}),
            ),
            AppError::CsrfFailed => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "CSRF validation failed",
                    "message": "Missing X-Storefront-CSRF header"
                }),
            ),
            AppError::AuthenticationFailed => (
                StatusCode::UNAUTHORIZED,
                json!({"ok": false, "error": GENERIC_FAILURE}),
            ),
            AppError::NoRefreshToken => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "No refresh token"}),
            ),
            AppError::RefreshFailed => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Refresh failed", "reason": "session_error"}),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, axum::Json(body)).into_response()
    }
}
