//! Login orchestration for both entry paths.
//!
//! The provider-redirect path stores its PKCE material in a short-lived
//! signed cookie scoped to `/api/auth`, separate from the session cookie.
//! The credentials path exchanges a username and password directly. Both
//! converge on [`complete_login`], which turns a token response into a
//! [`Session`].

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::guard::sanitize_callback_url;
use crate::idp::claims::{Claims, decode_or_empty};
use crate::idp::client::{IdpClient, IdpError, TokenResponse};
use crate::idp::pkce;
use crate::roles;
use crate::session::cookie;
use crate::session::store::{SessionStore, append_set_cookie, cookie_header};
use crate::session::{AuthMethod, Session, now_millis};

pub const PKCE_COOKIE: &str = "storefront_pkce";
pub const PKCE_COOKIE_PATH: &str = "/api/auth";
pub const PKCE_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Message shown to users for every login failure.
pub const GENERIC_FAILURE: &str = "Authentication failed";

/// PKCE material persisted between `/signin` and the provider callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkceState {
    pub state: String,
    pub code_verifier: String,
    pub callback_url: String,
    /// Epoch ms.
    pub created_at: u64,
}

/// Where to send the browser, plus the state nonce embedded in the URL.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Query parameters the provider sends to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("OAuth state does not match the stored value")]
    StateMismatch,

    #[error("PKCE verifier is missing or expired")]
    MissingVerifier,

    #[error("Authorization code missing from callback")]
    MissingCode,

    #[error("Provider returned an error: {0}")]
    Provider(String),

    #[error("Token exchange failed: {0}")]
    Exchange(#[from] IdpError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token response carries no subject")]
    MissingSubject,
}

impl LoginError {
    /// Stable name for logs and audit events. Never shown to users.
    pub fn kind(&self) -> &'static str {
        match self {
            LoginError::StateMismatch => "StateMismatch",
            LoginError::MissingVerifier => "MissingVerifier",
            LoginError::MissingCode => "MissingCode",
            LoginError::Provider(_) => "Provider",
            LoginError::Exchange(_) => "Exchange",
            LoginError::InvalidCredentials => "InvalidCredentials",
            LoginError::MissingSubject => "MissingSubject",
        }
    }
}

/// Start the provider-redirect login.
///
/// The returned [`PkceState`] must be persisted with [`write_pkce`] before
/// redirecting.
pub fn begin_authorization(
    config: &Config,
    callback_url: &str,
) -> Result<(AuthorizationRequest, PkceState), LoginError> {
    let state = pkce::generate_state();
    let code_verifier = pkce::generate_code_verifier();
    let code_challenge = pkce::generate_code_challenge(&code_verifier);

    let mut url = Url::parse(&config.authorization_url())
        .map_err(|e| LoginError::Provider(format!("invalid authorization endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.idp_client_id)
        .append_pair("redirect_uri", &config.redirect_uri())
        .append_pair("response_type", "code")
        .append_pair("scope", &config.idp_scope)
        .append_pair("state", &state)
        .append_pair("code_challenge", &code_challenge)
        .append_pair("code_challenge_method", "S256");

    let pkce_state = PkceState {
        state: state.clone(),
        code_verifier,
        callback_url: sanitize_callback_url(Some(callback_url)),
        created_at: now_millis(),
    };
    Ok((
        AuthorizationRequest {
            url: url.into(),
            state,
        },
        pkce_state,
    ))
}

/// Check the callback against the stored PKCE state and return the verifier.
pub fn verify_callback(
    stored: Option<&PkceState>,
    received_state: Option<&str>,
) -> Result<String, LoginError> {
    let stored = stored
        .filter(|s| !s.code_verifier.is_empty())
        .ok_or(LoginError::MissingVerifier)?;
    match received_state {
        Some(received) if received == stored.state => Ok(stored.code_verifier.clone()),
        _ => Err(LoginError::StateMismatch),
    }
}

/// Validate the callback and exchange the code. No exchange happens unless
/// the state and verifier checks pass.
pub async fn finish_authorization(
    idp: &IdpClient,
    redirect_uri: &str,
    stored: Option<&PkceState>,
    params: &CallbackParams,
    default_lifetime: Duration,
) -> Result<Session, LoginError> {
    let verifier = verify_callback(stored, params.state.as_deref())?;
    if let Some(error) = &params.error {
        let detail = match &params.error_description {
            Some(d) => format!("{error}: {d}"),
            None => error.clone(),
        };
        return Err(LoginError::Provider(detail));
    }
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(LoginError::MissingCode)?;

    let tokens = idp.exchange_code(code, &verifier, redirect_uri).await?;
    identified(complete_login(&tokens, AuthMethod::Oauth, now_millis(), default_lifetime))
}

/// Direct username/password exchange.
pub async fn login_with_credentials(
    idp: &IdpClient,
    username: &str,
    password: &str,
    default_lifetime: Duration,
) -> Result<Session, LoginError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(LoginError::InvalidCredentials);
    }
    match idp.password_grant(username.trim(), password).await {
        Ok(tokens) => identified(complete_login(
            &tokens,
            AuthMethod::Credentials,
            now_millis(),
            default_lifetime,
        )),
        Err(IdpError::Rejected(_)) => Err(LoginError::InvalidCredentials),
        Err(IdpError::Status { status: 400 | 401, .. }) => Err(LoginError::InvalidCredentials),
        Err(e) => Err(LoginError::Exchange(e)),
    }
}

/// A session nobody can be identified by is never stored.
fn identified(session: Session) -> Result<Session, LoginError> {
    if session.subject.is_empty() {
        return Err(LoginError::MissingSubject);
    }
    Ok(session)
}

/// Build a session from a validated token response.
///
/// Roles come from the access token's claims (the ID token's when the access
/// token carries none) and default to `{CUSTOMER}`. Email and name fall back
/// to the ID token.
pub fn complete_login(
    tokens: &TokenResponse,
    method: AuthMethod,
    now_ms: u64,
    default_lifetime: Duration,
) -> Session {
    let access = decode_or_empty(&tokens.access_token);
    let id = tokens
        .id_token
        .as_deref()
        .map(decode_or_empty)
        .unwrap_or_default();

    let raw_roles = if access.role_sources().is_empty() {
        id.raw_roles()
    } else {
        access.raw_roles()
    };

    Session {
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        id_token: tokens.id_token.clone(),
        access_token_expires_at: expires_at(tokens.expires_in, &access, now_ms, default_lifetime),
        roles: roles::resolve_or_default(raw_roles),
        error: None,
        subject: first_non_empty(&access.sub, &id.sub),
        email: access.email.clone().or_else(|| id.email.clone()),
        name: access
            .display_name()
            .or(id.display_name())
            .map(str::to_string),
        issued_at: now_ms,
        auth_method: method,
    }
}

/// `expires_in`, then the token's `exp` claim, then the configured default.
fn expires_at(expires_in: Option<u64>, access: &Claims, now_ms: u64, default_lifetime: Duration) -> u64 {
    if let Some(secs) = expires_in {
        return now_ms.saturating_add(secs.saturating_mul(1000));
    }
    match access.exp.map(|exp| exp.saturating_mul(1000)) {
        Some(exp_ms) if exp_ms > now_ms => exp_ms,
        _ => now_ms.saturating_add(default_lifetime.as_millis() as u64),
    }
}

fn first_non_empty(a: &str, b: &str) -> String {
    let chosen = if a.is_empty() { b } else { a };
    chosen.to_string()
}

/// Persist PKCE state in its own signed cookie.
pub fn write_pkce(headers: &mut HeaderMap, store: &SessionStore, pkce: &PkceState) {
    let payload = match serde_json::to_vec(pkce) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize PKCE state");
            return;
        }
    };
    let value = cookie::sign(store.secret(), &payload);
    let attrs = store.attrs(PKCE_COOKIE_PATH);
    append_set_cookie(
        headers,
        &cookie::make_set_cookie(PKCE_COOKIE, &value, PKCE_MAX_AGE.as_secs(), &attrs),
    );
}

/// Load PKCE state; tampered or expired cookies read as absent.
pub fn read_pkce(headers: &HeaderMap, store: &SessionStore) -> Option<PkceState> {
    let header = cookie_header(headers);
    let value = cookie::find_cookie(&header, PKCE_COOKIE)?;
    let payload = cookie::verify(store.secret(), value)?;
    let pkce: PkceState = serde_json::from_slice(&payload).ok()?;
    let age = now_millis().saturating_sub(pkce.created_at);
    if u128::from(age) > PKCE_MAX_AGE.as_millis() {
        tracing::debug!("PKCE state expired");
        return None;
    }
    Some(pkce)
}

/// PKCE state is single use.
pub fn clear_pkce(headers: &mut HeaderMap, store: &SessionStore) {
    let attrs = store.attrs(PKCE_COOKIE_PATH);
    append_set_cookie(headers, &cookie::make_delete_cookie(PKCE_COOKIE, &attrs));
}
