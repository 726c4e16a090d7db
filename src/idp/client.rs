//! Identity provider HTTP client: code exchange, password grant, refresh
//! and revocation.
//!
//! Every call carries an explicit per-request timeout. Transient failures
//! (timeout, network, 5xx) feed the shared [`IdpBreaker`]; any answer from
//! the provider, including a 4xx rejection, counts as a healthy round trip.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::breaker::IdpBreaker;
use crate::config::Config;

/// Validated token endpoint response. `access_token` is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

/// Wire shape before validation.
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth error body returned alongside 4xx statuses.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TryFrom<RawTokenResponse> for TokenResponse {
    type Error = IdpError;

    fn try_from(raw: RawTokenResponse) -> Result<Self, Self::Error> {
        if let Some(error) = raw.error {
            return Err(IdpError::Rejected(describe(&error, raw.error_description.as_deref())));
        }
        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IdpError::MalformedResponse("missing access_token".into()))?;
        Ok(TokenResponse {
            access_token,
            token_type: raw.token_type,
            expires_in: raw.expires_in,
            refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
            id_token: raw.id_token.filter(|t| !t.is_empty()),
        })
    }
}

pub struct IdpClient {
    http: reqwest::Client,
    token_url: String,
    revocation_url: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
    breaker: Arc<IdpBreaker>,
}

impl IdpClient {
    pub fn new(config: &Config, http: reqwest::Client, breaker: Arc<IdpBreaker>) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            revocation_url: config.revocation_url(),
            client_id: config.idp_client_id.clone(),
            client_secret: config.idp_client_secret.clone(),
            timeout: config.idp_timeout(),
            breaker,
        }
    }

    pub fn breaker(&self) -> &IdpBreaker {
        &self.breaker
    }

    /// Exchange an authorization code plus PKCE verifier for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, IdpError> {
        self.token_request(
            "authorization_code",
            &[
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", redirect_uri),
            ],
        )
        .await
    }

    /// Resource-owner password grant. The password only ever goes into the form body.
    pub async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, IdpError> {
        self.token_request(
            "password",
            &[("username", username), ("password", password), ("scope", "openid")],
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IdpError> {
        self.token_request("refresh_token", &[("refresh_token", refresh_token)])
            .await
    }

    /// Revoke a refresh token at the provider's logout endpoint.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), IdpError> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("token", refresh_token),
            ("token_type_hint", "refresh_token"),
        ];
        if !self.client_secret.is_empty() {
            params.push(("client_secret", self.client_secret.as_str()));
        }

        let resp = self.send(&self.revocation_url, &params).await?;
        let status = resp.status();
        if status.is_success() {
            self.breaker.record_success();
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(self.status_error(status.as_u16(), body))
    }

    async fn token_request(
        &self,
        grant_type: &'static str,
        extra: &[(&str, &str)],
    ) -> Result<TokenResponse, IdpError> {
        let mut params = vec![
            ("grant_type", grant_type),
            ("client_id", self.client_id.as_str()),
        ];
        if !self.client_secret.is_empty() {
            params.push(("client_secret", self.client_secret.as_str()));
        }
        params.extend_from_slice(extra);

        tracing::debug!(grant_type, "Calling identity provider token endpoint");
        let resp = self.send(&self.token_url, &params).await?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(self.status_error(status.as_u16(), body));
        }
        self.breaker.record_success();

        let raw: RawTokenResponse = serde_json::from_str(&body)
            .map_err(|e| IdpError::MalformedResponse(e.to_string()))?;
        TokenResponse::try_from(raw)
    }

    async fn send(&self, url: &str, params: &[(&str, &str)]) -> Result<reqwest::Response, IdpError> {
        self.http
            .post(url)
            .form(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> IdpError {
        self.breaker.record_failure();
        if e.is_timeout() {
            IdpError::Timeout
        } else {
            IdpError::Network(e.to_string())
        }
    }

    fn status_error(&self, status: u16, body: String) -> IdpError {
        if status >= 500 {
            self.breaker.record_failure();
            return IdpError::Status { status, body };
        }
        self.breaker.record_success();
        match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(err) => IdpError::Rejected(describe(&err.error, err.error_description.as_deref())),
            Err(_) => IdpError::Status { status, body },
        }
    }
}

fn describe(error: &str, description: Option<&str>) -> String {
    match description {
        Some(d) if !d.is_empty() => format!("{error}: {d}"),
        _ => error.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    #[error("Identity provider request timed out")]
    Timeout,

    #[error("Identity provider unreachable: {0}")]
    Network(String),

    #[error("Identity provider returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

impl IdpError {
    /// Worth retrying: timeouts, network failures and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            IdpError::Timeout | IdpError::Network(_) => true,
            IdpError::Status { status, .. } => *status >= 500,
            IdpError::Rejected(_) | IdpError::MalformedResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::breaker::BreakerState;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, breaker_threshold: u32) -> IdpClient {
        let mut config = Config::test_default();
        config.idp_token_url = Some(format!("{}/token", server.uri()));
        config.idp_revocation_url = Some(format!("{}/logout", server.uri()));
        config.idp_timeout_ms = 200;
        let breaker = Arc::new(IdpBreaker::new(breaker_threshold, Duration::from_secs(60)));
        IdpClient::new(&config, reqwest::Client::new(), breaker)
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=storefront-web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "token_type": "Bearer",
                "expires_in": 600,
                "refresh_token": "rt-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client_for(&server, 5).refresh("rt-1").await.unwrap();
        assert_eq!(tokens.access_token, "at-2");
        assert_eq!(tokens.expires_in, Some(600));
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-2"));
        assert!(tokens.id_token.is_none());
    }

    #[tokio::test]
    async fn test_client_secret_omitted_for_public_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("client_secret"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at"})))
            .mount(&server)
            .await;

        assert!(client_for(&server, 5).refresh("rt").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_access_token_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"refresh_token": "rt-2", "expires_in": 300})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, 5).refresh("rt-1").await.unwrap_err();
        assert!(matches!(err, IdpError::MalformedResponse(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_error_payload_with_200_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let err = client_for(&server, 5).refresh("rt-1").await.unwrap_err();
        assert!(matches!(err, IdpError::Rejected(ref m) if m == "invalid_grant"));
    }

    #[tokio::test]
    async fn test_invalid_grant_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token is not active"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, 1);
        let err = client.refresh("rt-1").await.unwrap_err();
        assert!(matches!(err, IdpError::Rejected(ref m) if m == "invalid_grant: Token is not active"));
        // A rejection is a healthy round trip.
        assert_eq!(client.breaker().state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, 5).refresh("rt-1").await.unwrap_err();
        assert!(matches!(err, IdpError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_transient_and_trips_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server, 2);
        let err = client.refresh("rt").await.unwrap_err();
        assert!(matches!(err, IdpError::Status { status: 503, .. }));
        assert!(err.is_transient());
        assert_eq!(client.breaker().state(), BreakerState::Closed);
        let _ = client.refresh("rt").await;
        assert_eq!(client.breaker().state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, 5).refresh("rt").await.unwrap_err();
        assert!(matches!(err, IdpError::Timeout));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .and(body_string_contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "id_token": "it"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client_for(&server, 5)
            .exchange_code("the-code", "the-verifier", "http://localhost:3000/cb")
            .await
            .unwrap();
        assert_eq!(tokens.id_token.as_deref(), Some("it"));
    }

    #[tokio::test]
    async fn test_password_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=sam"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at"})))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client_for(&server, 5).password_grant("sam", "hunter2").await.unwrap();
        assert_eq!(tokens.access_token, "at");
    }

    #[tokio::test]
    async fn test_revoke_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .and(body_string_contains("refresh_token=rt-9"))
            .and(body_string_contains("token_type_hint=refresh_token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server, 5).revoke("rt-9").await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server, 5).revoke("rt").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_successful_revoke_closes_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server, 2);
        client.breaker().record_failure();
        client.breaker().record_failure();
        assert_eq!(client.breaker().state(), BreakerState::Open);

        client.revoke("rt").await.unwrap();
        assert_eq!(client.breaker().consecutive_failures(), 0);
        assert_eq!(client.breaker().state(), BreakerState::Closed);
    }
}
