//! Cookie-backed session management.
//!
//! The whole [`Session`] travels in signed, HttpOnly cookies: `cookie` does
//! the signing and chunking, `store` implements read/write/clear against
//! header maps, and `middleware` exposes a request-scoped [`SessionHandle`]
//! that is persisted after the handler returns.
//!
//! [`SessionHandle`]: middleware::SessionHandle

pub mod cookie;
pub mod middleware;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::roles::Role;

/// How the session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Authorization code + PKCE redirect through the provider.
    Oauth,
    /// Direct username/password exchange.
    Credentials,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Oauth => "oauth",
            AuthMethod::Credentials => "credentials",
        }
    }
}

/// Sticky failure marker. A session carrying one is never authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionError {
    RefreshFailed,
}

impl SessionError {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionError::RefreshFailed => "RefreshFailed",
        }
    }
}

/// The current user's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Epoch milliseconds.
    pub access_token_expires_at: u64,
    pub roles: BTreeSet<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Epoch milliseconds of the initial login; anchors the lifetime ceiling.
    pub issued_at: u64,
    pub auth_method: AuthMethod,
}

impl Session {
    /// Usable for authorization: no sticky error, a non-empty token and a
    /// known subject.
    pub fn is_authenticated(&self) -> bool {
        self.error.is_none() && !self.access_token.is_empty() && !self.subject.is_empty()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Copy of this session marked unusable, with the refresh token dropped
    /// so it cannot be replayed.
    pub fn into_failed(mut self, error: SessionError) -> Self {
        self.error = Some(error);
        self.refresh_token = None;
        self
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
pub(crate) fn test_session(subject: &str, roles: &[Role]) -> Session {
    let now = now_millis();
    Session {
        access_token: format!("at-{subject}"),
        refresh_token: Some(format!("rt-{subject}")),
        id_token: None,
        access_token_expires_at: now + 300_000,
        roles: roles.iter().copied().collect(),
        error: None,
        subject: subject.to_string(),
        email: Some(format!("{subject}@example.com")),
        name: None,
        issued_at: now,
        auth_method: AuthMethod::Oauth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_session_not_authenticated() {
        let session = test_session("u1", &[Role::Admin]);
        assert!(session.is_authenticated());

        let failed = session.into_failed(SessionError::RefreshFailed);
        assert!(!failed.is_authenticated());
        assert!(failed.refresh_token.is_none());
        // The access token is still textually present.
        assert_eq!(failed.access_token, "at-u1");
    }

    #[test]
    fn test_empty_access_token_not_authenticated() {
        let mut session = test_session("u1", &[Role::Customer]);
        session.access_token.clear();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_empty_subject_not_authenticated() {
        let mut session = test_session("u1", &[Role::Customer]);
        session.subject.clear();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_serde_roundtrip_preserves_every_field() {
        let mut session = test_session("u1", &[Role::Seller, Role::Customer]);
        session.id_token = Some("it".into());
        session.name = Some("Sam".into());
        session.error = Some(SessionError::RefreshFailed);
        session.auth_method = AuthMethod::Credentials;

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_absent_optionals_are_omitted() {
        let mut session = test_session("u1", &[Role::Customer]);
        session.refresh_token = None;
        session.email = None;
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("email").is_none());
        assert_eq!(json["roles"], serde_json::json!(["CUSTOMER"]));
        assert_eq!(json["auth_method"], "oauth");
    }
}
