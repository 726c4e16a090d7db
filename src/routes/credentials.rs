//! POST /api/auth/callback/credentials

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::error::AppError;
use crate::guard::sanitize_callback_url;
use crate::login::{LoginError, login_with_credentials};
use crate::ocsf;
use crate::session::AuthMethod;
use crate::session::middleware::SessionHandle;
use crate::types::{CredentialsRequest, CredentialsResponse};

/// Username/password login. Every failure answers with the same generic
/// 401 body; the real cause only reaches the logs.
pub async fn credentials_login(
    State(state): State<Arc<crate::AppState>>,
    session: SessionHandle,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<CredentialsResponse>, AppError> {
    let result = login_with_credentials(
        &state.idp,
        &body.username,
        &body.password,
        state.config.default_token_lifetime(),
    )
    .await;

    match result {
        Ok(next) => {
            ocsf::authentication_event(
                ocsf::ACTIVITY_LOGON,
                "Logon",
                ocsf::STATUS_SUCCESS,
                ocsf::SEVERITY_INFORMATIONAL,
                ocsf::Actor::of(&next),
                Some(AuthMethod::Credentials),
                "Credentials login succeeded",
            );
            tracing::info!(subject = %next.subject, "Login completed via credentials");
            session.replace(next).await;
            Ok(Json(CredentialsResponse {
                ok: true,
                url: sanitize_callback_url(body.callback_url.as_deref()),
            }))
        }
        Err(e) => {
            let severity = match e {
                LoginError::InvalidCredentials => ocsf::SEVERITY_LOW,
                _ => ocsf::SEVERITY_MEDIUM,
            };
            tracing::warn!(kind = e.kind(), error = %e, "Credentials login failed");
            ocsf::authentication_event(
                ocsf::ACTIVITY_LOGON,
                "Logon",
                ocsf::STATUS_FAILURE,
                severity,
                ocsf::Actor::default(),
                Some(AuthMethod::Credentials),
                &format!("Credentials login failed: {}", e.kind()),
            );
            Err(AppError::AuthenticationFailed)
        }
    }
}
