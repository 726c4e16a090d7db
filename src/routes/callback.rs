//! GET /api/auth/callback/idp

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

use crate::guard::{HOME_PATH, LOGIN_PATH};
use crate::login::{CallbackParams, GENERIC_FAILURE, clear_pkce, finish_authorization, read_pkce};
use crate::ocsf;
use crate::session::AuthMethod;
use crate::session::middleware::SessionHandle;

/// OAuth callback: verify state, exchange the code, store the session and
/// send the browser to its original destination.
///
/// The PKCE cookie is cleared whatever the outcome.
pub async fn idp_callback(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
    session: SessionHandle,
    Query(params): Query<CallbackParams>,
) -> Response {
    let stored = read_pkce(&headers, &state.sessions);
    let result = finish_authorization(
        &state.idp,
        &state.config.redirect_uri(),
        stored.as_ref(),
        &params,
        state.config.default_token_lifetime(),
    )
    .await;

    let mut out = HeaderMap::new();
    clear_pkce(&mut out, &state.sessions);

    match result {
        Ok(next) => {
            ocsf::authentication_event(
                ocsf::ACTIVITY_LOGON,
                "Logon",
                ocsf::STATUS_SUCCESS,
                ocsf::SEVERITY_INFORMATIONAL,
                ocsf::Actor::of(&next),
                Some(AuthMethod::Oauth),
                "OAuth code exchange succeeded",
            );
            tracing::info!(subject = %next.subject, "Login completed via provider redirect");
            session.replace(next).await;

            let target = stored
                .map(|s| s.callback_url)
                .unwrap_or_else(|| HOME_PATH.to_string());
            (out, Redirect::temporary(&target)).into_response()
        }
        Err(e) => {
            tracing::warn!(kind = e.kind(), error = %e, "Provider login failed");
            ocsf::authentication_event(
                ocsf::ACTIVITY_AUTH_TICKET,
                "Authentication Ticket",
                ocsf::STATUS_FAILURE,
                ocsf::SEVERITY_MEDIUM,
                ocsf::Actor::default(),
                Some(AuthMethod::Oauth),
                &format!("OAuth login failed: {}", e.kind()),
            );
            let location = format!("{LOGIN_PATH}?error={}", urlencoding::encode(GENERIC_FAILURE));
            (out, Redirect::temporary(&location)).into_response()
        }
    }
}
