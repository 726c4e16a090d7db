//! CSRF validation: require `X-Storefront-CSRF: 1` on state-changing auth routes.
//!
//! A cross-site form post cannot set custom headers, and SameSite=Lax
//! cookies are not sent on cross-site fetches that could.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

pub const CSRF_HEADER: &str = "x-storefront-csrf";

/// Axum middleware that requires the `X-Storefront-CSRF: 1` header.
pub async fn require_csrf(req: Request, next: Next) -> Result<Response, impl IntoResponse> {
    if req.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok()) != Some("1") {
        tracing::warn!(path = %req.uri().path(), "Rejected request without CSRF header");
        return Err(AppError::CsrfFailed);
    }
    Ok(next.run(req).await)
}
