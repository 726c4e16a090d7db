//! POST /api/auth/refresh

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::error::AppError;
use crate::refresh::RefreshOutcome;
use crate::session::middleware::SessionHandle;
use crate::types::RefreshResponse;

/// Refresh the access token now, regardless of its remaining lifetime.
///
/// A failure leaves the errored session in place, so the next guarded
/// request sees `session_error` and clears it.
pub async fn refresh_tokens(
    State(state): State<Arc<crate::AppState>>,
    session: SessionHandle,
) -> Result<Json<RefreshResponse>, AppError> {
    let current = session
        .get()
        .await
        .ok_or(AppError::NotAuthenticated("no_session"))?;
    if !current.is_authenticated() {
        return Err(AppError::NotAuthenticated("session_error"));
    }

    match state.refresher.force_refresh(&session, &current).await {
        RefreshOutcome::Refreshed(next) => Ok(Json(RefreshResponse {
            success: true,
            expires_at: next.access_token_expires_at,
        })),
        RefreshOutcome::NoRefreshToken => Err(AppError::NoRefreshToken),
        RefreshOutcome::Failed(_) => Err(AppError::RefreshFailed),
    }
}
