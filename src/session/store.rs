//! Session persistence in signed, chunked, HttpOnly cookies.
//!
//! `write` always replaces the full session value. `Max-Age` counts down to
//! `issued_at + max_age`, so refreshes never extend the lifetime ceiling.

use axum::http::{HeaderMap, HeaderValue, header};
use std::time::Duration;

use super::cookie::{self, CookieAttrs};
use super::{Session, now_millis};

pub const SESSION_COOKIE: &str = "storefront_session";

/// Reads, writes and clears the session cookie(s).
#[derive(Debug, Clone)]
pub struct SessionStore {
    secret: String,
    https_only: bool,
    cookie_domain: Option<String>,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(
        secret: impl Into<String>,
        https_only: bool,
        cookie_domain: Option<String>,
        max_age: Duration,
    ) -> Self {
        Self {
            secret: secret.into(),
            https_only,
            cookie_domain,
            max_age,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.session_secret.clone(),
            config.session_https_only,
            config.cookie_domain.clone(),
            config.session_max_age(),
        )
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub(crate) fn attrs<'a>(&'a self, path: &'a str) -> CookieAttrs<'a> {
        CookieAttrs {
            path,
            https_only: self.https_only,
            domain: self.cookie_domain.as_deref(),
        }
    }

    /// Load the session from request cookies.
    ///
    /// Returns `None` for absent, tampered, undecodable, or over-age sessions.
    pub fn read(&self, headers: &HeaderMap) -> Option<Session> {
        let cookie_header = cookie_header(headers);
        let cookies = cookie::parse_cookies(&cookie_header);
        let signed = cookie::reassemble(&cookies, SESSION_COOKIE)?;

        let Some(payload) = cookie::verify(self.secret(), &signed) else {
            tracing::warn!("Session cookie failed signature verification");
            return None;
        };
        let session: Session = match serde_json::from_slice(&payload) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Session cookie payload could not be decoded");
                return None;
            }
        };

        if self.remaining_secs(&session, now_millis()) == 0 {
            tracing::debug!(subject = %session.subject, "Session exceeded its lifetime ceiling");
            return None;
        }
        Some(session)
    }

    /// Names of session cookies (including chunks) sent with the request.
    pub fn present_cookie_names(&self, headers: &HeaderMap) -> Vec<String> {
        let cookie_header = cookie_header(headers);
        let cookies = cookie::parse_cookies(&cookie_header);
        cookie::present_names(&cookies, SESSION_COOKIE)
    }

    /// Serialize the full session into response cookies.
    ///
    /// Cookies in `stale` that the new value does not overwrite are deleted.
    pub fn write(&self, headers: &mut HeaderMap, session: &Session, stale: &[String]) {
        let payload = match serde_json::to_vec(session) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize session");
                return;
            }
        };
        let signed = cookie::sign(self.secret(), &payload);
        let max_age = self.remaining_secs(session, now_millis());
        let attrs = self.attrs("/");

        let chunks = cookie::chunk(SESSION_COOKIE, &signed);
        for (name, value) in &chunks {
            append_set_cookie(headers, &cookie::make_set_cookie(name, value, max_age, &attrs));
        }
        for name in stale {
            if !chunks.iter().any(|(n, _)| n == name) {
                append_set_cookie(headers, &cookie::make_delete_cookie(name, &attrs));
            }
        }
    }

    /// Expire every session cookie the browser holds.
    pub fn clear(&self, headers: &mut HeaderMap, present: &[String]) {
        let attrs = self.attrs("/");
        append_set_cookie(headers, &cookie::make_delete_cookie(SESSION_COOKIE, &attrs));
        for name in present.iter().filter(|n| n.as_str() != SESSION_COOKIE) {
            append_set_cookie(headers, &cookie::make_delete_cookie(name, &attrs));
        }
    }

    /// Seconds left before the lifetime ceiling, measured from `issued_at`.
    fn remaining_secs(&self, session: &Session, now_ms: u64) -> u64 {
        let deadline = session
            .issued_at
            .saturating_add(self.max_age.as_millis() as u64);
        deadline.saturating_sub(now_ms) / 1000
    }
}

/// All `Cookie` headers joined (HTTP/2 may split them).
pub(crate) fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Refusing to emit malformed Set-Cookie header"),
    }
}
