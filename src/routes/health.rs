//! GET /health

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::types::HealthResponse;

/// Health check. Reports the identity provider breaker state.
pub async fn health(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        mode: "auth-proxy".into(),
        idp: state.idp.breaker().state().as_str().into(),
    })
}
