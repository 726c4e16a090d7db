//! Test utilities: token factory, wiremock provider, test app builder, cookie helpers.

#![allow(dead_code)]

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, header};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use storefront_auth::config::Config;
use storefront_auth::guard::{USER_ID_HEADER, USER_ROLES_HEADER};
use storefront_auth::roles::Role;
use storefront_auth::session::{AuthMethod, Session};
use storefront_auth::{AppState, create_app};
use wiremock::MockServer;

pub const CSRF_HEADER: &str = "X-Storefront-CSRF";

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Build an unsigned JWT; the service never verifies signatures.
pub fn make_unsigned_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(b"fake-signature");
    format!("{header}.{payload}.{sig}")
}

/// Access token with realm roles.
pub fn access_token(sub: &str, roles: &[&str]) -> String {
    make_unsigned_jwt(&json!({
        "sub": sub,
        "email": format!("{sub}@example.com"),
        "name": "Test Shopper",
        "realm_access": { "roles": roles },
        "exp": now_ms() / 1000 + 300,
    }))
}

/// Token endpoint success body.
pub fn token_body(sub: &str, roles: &[&str], refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token(sub, roles),
        "token_type": "Bearer",
        "expires_in": 300,
    });
    if let Some(rt) = refresh_token {
        body["refresh_token"] = json!(rt);
    }
    body
}

/// Config pointing every provider endpoint at the mock server.
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::test_default();
    config.idp_issuer = server.uri();
    config.idp_authorization_url = Some(format!("{}/auth", server.uri()));
    config.idp_token_url = Some(format!("{}/token", server.uri()));
    config.idp_revocation_url = Some(format!("{}/logout", server.uri()));
    config.idp_timeout_ms = 500;
    config.revoke_backoff_ms = 1;
    config
}

/// Downstream pages echo the identity headers the guard injected.
async fn echo_identity(headers: HeaderMap) -> Json<Value> {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    Json(json!({
        "user_id": value(USER_ID_HEADER),
        "roles": value(USER_ROLES_HEADER),
    }))
}

pub fn pages() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(echo_identity))
        .route("/products", get(echo_identity))
        .route("/login", get(echo_identity))
        .route("/access-denied", get(echo_identity))
        .route("/orders", get(echo_identity))
        .route("/admin/dashboard", get(echo_identity))
        .route("/seller/listings", get(echo_identity))
        .route("/api/orders", get(echo_identity))
        .route("/api/admin/stats", get(echo_identity))
}

pub fn build_test_app(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    let app = create_app(state.clone(), pages());
    (app, state)
}

/// A session that expires `ttl_ms` from now.
pub fn session_for(subject: &str, roles: &[Role], ttl_ms: u64) -> Session {
    let now = now_ms();
    Session {
        access_token: access_token(subject, &[]),
        refresh_token: Some(format!("rt-{subject}")),
        id_token: None,
        access_token_expires_at: now + ttl_ms,
        roles: roles.iter().copied().collect::<BTreeSet<_>>(),
        error: None,
        subject: subject.to_string(),
        email: Some(format!("{subject}@example.com")),
        name: None,
        issued_at: now,
        auth_method: AuthMethod::Oauth,
    }
}

/// `Cookie` header value carrying `session`, signed with the app's secret.
pub fn session_cookie(state: &AppState, session: &Session) -> String {
    let mut headers = HeaderMap::new();
    state.sessions.write(&mut headers, session, &[]);
    cookie_from_set_cookies(&headers)
}

/// Turn `Set-Cookie` headers into a `Cookie` header, skipping deletions.
pub fn cookie_from_set_cookies(headers: &HeaderMap) -> String {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| s.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, v)| !v.is_empty()))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect()
}

/// The response deleted the session cookie.
pub fn clears_session(headers: &HeaderMap) -> bool {
    set_cookies(headers)
        .iter()
        .any(|c| c.starts_with("storefront_session=;") && c.contains("Max-Age=0"))
}

/// The response wrote a new session cookie.
pub fn writes_session(headers: &HeaderMap) -> bool {
    set_cookies(headers)
        .iter()
        .any(|c| c.starts_with("storefront_session=") && !c.contains("Max-Age=0"))
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
