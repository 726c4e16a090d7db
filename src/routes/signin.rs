//! GET /api/auth/signin

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

use crate::error::AppError;
use crate::login::{begin_authorization, write_pkce};
use crate::types::SigninParams;

/// Start the provider-redirect login: persist PKCE state, then redirect.
pub async fn signin(
    State(state): State<Arc<crate::AppState>>,
    Query(params): Query<SigninParams>,
) -> Result<Response, AppError> {
    let callback_url = params.callback_url.as_deref().unwrap_or("/");
    let (request, pkce) = begin_authorization(&state.config, callback_url)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    write_pkce(&mut headers, &state.sessions, &pkce);
    tracing::debug!(callback_url = %pkce.callback_url, "Redirecting to identity provider");
    Ok((headers, Redirect::temporary(&request.url)).into_response())
}
