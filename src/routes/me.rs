//! GET /api/auth/me

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::error::AppError;
use crate::session::middleware::SessionHandle;
use crate::types::UserInfoResponse;

/// Current user, refreshed first if the access token is about to expire.
///
/// Tokens never leave the server through this endpoint.
pub async fn me(
    State(state): State<Arc<crate::AppState>>,
    session: SessionHandle,
) -> Result<Json<UserInfoResponse>, AppError> {
    let current = state
        .refresher
        .ensure_fresh(&session)
        .await
        .ok_or(AppError::NotAuthenticated("no_session"))?;

    if !current.is_authenticated() {
        session.destroy().await;
        return Err(AppError::NotAuthenticated("session_error"));
    }

    Ok(Json(UserInfoResponse {
        id: current.subject,
        email: current.email,
        name: current.name,
        roles: current.roles.iter().map(|r| r.as_str().to_string()).collect(),
    }))
}
