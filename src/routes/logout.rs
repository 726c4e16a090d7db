//! POST /api/auth/signout

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::session::middleware::SessionHandle;
use crate::types::LogoutResponse;

/// Sign out. Always succeeds locally; `revoked` reports whether the
/// provider confirmed the refresh token revocation.
pub async fn logout(
    State(state): State<Arc<crate::AppState>>,
    session: SessionHandle,
) -> Json<LogoutResponse> {
    let outcome = state.logout.logout(&session).await;
    Json(LogoutResponse {
        success: true,
        revoked: outcome.revoked,
    })
}
