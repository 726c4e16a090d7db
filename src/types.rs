//! Shared request/response DTOs for the `/api/auth` surface.

use serde::{Deserialize, Serialize};

/// POST /api/auth/callback/credentials request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub callback_url: Option<String>,
}

/// POST /api/auth/callback/credentials response. `url` is the sanitized
/// post-login destination.
#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub ok: bool,
    pub url: String,
}

/// GET /api/auth/signin query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninParams {
    pub callback_url: Option<String>,
}

/// POST /api/auth/refresh response.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    /// Epoch milliseconds.
    pub expires_at: u64,
}

/// POST /api/auth/signout response.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub revoked: bool,
}

/// GET /api/auth/me response.
#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
    pub idp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_request_camel_case() {
        let json = r#"{
            "username": "alice",
            "password": "hunter2",
            "callbackUrl": "/orders"
        }"#;
        let req: CredentialsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.username, "alice");
        assert_eq!(req.password, "hunter2");
        assert_eq!(req.callback_url.as_deref(), Some("/orders"));
    }

    #[test]
    fn test_credentials_request_missing_fields_default() {
        let req: CredentialsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.username.is_empty());
        assert!(req.password.is_empty());
        assert!(req.callback_url.is_none());
    }

    #[test]
    fn test_user_info_never_carries_tokens() {
        let resp = UserInfoResponse {
            id: "u1".into(),
            email: Some("u1@example.com".into()),
            name: None,
            roles: vec!["CUSTOMER".into()],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["roles"][0], "CUSTOMER");
        assert!(json.get("access_token").is_none());
        assert!(json.get("refresh_token").is_none());
    }

    #[test]
    fn test_health_response() {
        let resp = HealthResponse {
            status: "ok".into(),
            mode: "auth-proxy".into(),
            idp: "closed".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["idp"], "closed");
    }
}
