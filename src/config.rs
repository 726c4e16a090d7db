//! Application configuration via environment variables.
//!
//! Identity provider endpoints default to the OpenID Connect layout under
//! `IDP_ISSUER`; each can be overridden individually. Timing constants
//! (refresh buffer, default token lifetime, upstream timeout) are plain
//! configuration with documented defaults.

use std::env;
use std::time::Duration;

/// Shortest accepted `SESSION_SECRET`. The session, roles included, is only
/// as trustworthy as this key.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub idp_issuer: String,
    pub idp_client_id: String,
    pub idp_client_secret: String,
    pub idp_authorization_url: Option<String>,
    pub idp_token_url: Option<String>,
    pub idp_revocation_url: Option<String>,
    pub idp_scope: String,
    pub public_url: String,
    pub session_secret: String,
    pub session_https_only: bool,
    pub cookie_domain: Option<String>,
    pub session_max_age_secs: u64,
    pub refresh_buffer_secs: u64,
    pub default_token_lifetime_secs: u64,
    pub idp_timeout_ms: u64,
    pub revoke_max_retries: u32,
    pub revoke_backoff_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `IDP_ISSUER`, `IDP_CLIENT_ID`, `SESSION_SECRET` (at least
    /// [`MIN_SESSION_SECRET_LEN`] bytes). Cookies are `Secure` unless
    /// `SESSION_HTTPS_ONLY=false`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(key.into()))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Ok(Self {
            idp_issuer: required("IDP_ISSUER")?.trim_end_matches('/').to_string(),
            idp_client_id: required("IDP_CLIENT_ID")?,
            idp_client_secret: lookup("IDP_CLIENT_SECRET").unwrap_or_default(),
            idp_authorization_url: optional("IDP_AUTHORIZATION_URL"),
            idp_token_url: optional("IDP_TOKEN_URL"),
            idp_revocation_url: optional("IDP_REVOCATION_URL"),
            idp_scope: optional("IDP_SCOPE").unwrap_or_else(|| "openid profile email".into()),
            public_url: optional("APP_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            session_secret: session_secret(required("SESSION_SECRET")?)?,
            session_https_only: optional("SESSION_HTTPS_ONLY")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            cookie_domain: optional("COOKIE_DOMAIN"),
            session_max_age_secs: parse_or(&lookup, "SESSION_MAX_AGE_SECS", 30 * 24 * 3600)?,
            refresh_buffer_secs: parse_or(&lookup, "REFRESH_BUFFER_SECS", 60)?,
            default_token_lifetime_secs: parse_or(&lookup, "DEFAULT_TOKEN_LIFETIME_SECS", 300)?,
            idp_timeout_ms: parse_or(&lookup, "IDP_TIMEOUT_MS", 10_000)?,
            revoke_max_retries: parse_or(&lookup, "REVOKE_MAX_RETRIES", 2)?,
            revoke_backoff_ms: parse_or(&lookup, "REVOKE_BACKOFF_MS", 200)?,
            breaker_threshold: parse_or(&lookup, "IDP_BREAKER_THRESHOLD", 5)?,
            breaker_cooldown_secs: parse_or(&lookup, "IDP_BREAKER_COOLDOWN_SECS", 30)?,
            port: parse_or(&lookup, "PORT", 3000)?,
        })
    }

    /// Authorization endpoint for the provider-redirect login.
    pub fn authorization_url(&self) -> String {
        self.idp_authorization_url
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/auth", self.idp_issuer))
    }

    /// Token endpoint (code exchange, password grant, refresh).
    pub fn token_url(&self) -> String {
        self.idp_token_url
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/token", self.idp_issuer))
    }

    /// Refresh-token revocation / logout endpoint.
    pub fn revocation_url(&self) -> String {
        self.idp_revocation_url
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/logout", self.idp_issuer))
    }

    /// Redirect URI registered with the provider for the PKCE callback.
    pub fn redirect_uri(&self) -> String {
        format!("{}/api/auth/callback/idp", self.public_url)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_secs)
    }

    /// Lifetime assumed when the provider reports neither `expires_in` nor `exp`.
    pub fn default_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.default_token_lifetime_secs)
    }

    pub fn idp_timeout(&self) -> Duration {
        Duration::from_millis(self.idp_timeout_ms)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }
}

/// Configuration for testing; all fields settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            idp_issuer: "http://localhost:8080/realms/storefront".into(),
            idp_client_id: "storefront-web".into(),
            idp_client_secret: String::new(),
            idp_authorization_url: None,
            idp_token_url: None,
            idp_revocation_url: None,
            idp_scope: "openid profile email".into(),
            public_url: "http://localhost:3000".into(),
            session_secret: "test-secret-key-for-unit-tests-only".into(),
            session_https_only: false,
            cookie_domain: None,
            session_max_age_secs: 30 * 24 * 3600,
            refresh_buffer_secs: 60,
            default_token_lifetime_secs: 300,
            idp_timeout_ms: 2_000,
            revoke_max_retries: 2,
            revoke_backoff_ms: 1,
            breaker_threshold: 5,
            breaker_cooldown_secs: 30,
            port: 3000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("SESSION_SECRET must be at least {min} bytes")]
    WeakSecret { min: usize },
}

fn session_secret(secret: String) -> Result<String, ConfigError> {
    if secret.len() < MIN_SESSION_SECRET_LEN {
        return Err(ConfigError::WeakSecret {
            min: MIN_SESSION_SECRET_LEN,
        });
    }
    Ok(secret)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).filter(|v| !v.is_empty()) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.into(),
            value,
        }),
        None => Ok(default),
    }
}
