//! Bearer token payload decoding.
//!
//! Tokens reach us over the provider's TLS channel and are only ever stored
//! in HttpOnly cookies, so the payload is decoded without signature
//! verification. Role claims arrive in three shapes depending on how the
//! provider realm is configured; [`Claims::role_sources`] names each shape
//! and [`Claims::raw_roles`] merges them.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// Claims extracted from an access or ID token.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub realm_access: Option<RoleList>,
    #[serde(default)]
    pub resource_access: BTreeMap<String, RoleList>,
}

/// `{ "roles": [...] }` as used by `realm_access` and each `resource_access` client.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RoleList {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Where a group of raw role strings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSource<'a> {
    /// Top-level `roles` array.
    Flat(&'a [String]),
    /// `realm_access.roles`.
    Realm(&'a [String]),
    /// `resource_access.<client>.roles`.
    Resource { client: &'a str, roles: &'a [String] },
}

impl<'a> RoleSource<'a> {
    pub fn roles(&self) -> &'a [String] {
        match self {
            RoleSource::Flat(roles) | RoleSource::Realm(roles) => *roles,
            RoleSource::Resource { roles, .. } => *roles,
        }
    }
}

impl Claims {
    /// Every role-bearing claim present in the token, in a fixed order.
    pub fn role_sources(&self) -> Vec<RoleSource<'_>> {
        let mut sources = Vec::new();
        if !self.roles.is_empty() {
            sources.push(RoleSource::Flat(&self.roles));
        }
        if let Some(realm) = &self.realm_access {
            sources.push(RoleSource::Realm(&realm.roles));
        }
        for (client, list) in &self.resource_access {
            sources.push(RoleSource::Resource {
                client,
                roles: &list.roles,
            });
        }
        sources
    }

    /// Union of all role claims, deduplicated, first occurrence wins.
    pub fn raw_roles(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.role_sources()
            .iter()
            .flat_map(|source| source.roles().iter())
            .filter(|role| seen.insert(role.as_str()))
            .cloned()
            .collect()
    }

    /// Display name: `name`, then `preferred_username`.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
    }
}

/// Decode a JWT payload without signature verification.
pub fn decode_unverified(token: &str) -> Result<Claims, DecodeError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DecodeError::InvalidFormat);
    };

    // Some providers pad their segments; base64url without padding rejects that.
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| DecodeError::InvalidBase64)?;

    serde_json::from_slice(&payload_bytes).map_err(|e| DecodeError::InvalidPayload(e.to_string()))
}

/// Decode a token, falling back to empty claims on failure.
///
/// A malformed token never fails the request; callers treat it as "no claims".
pub fn decode_or_empty(token: &str) -> Claims {
    match decode_unverified(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "Token payload could not be decoded, continuing without claims");
            Claims::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid JWT format")]
    InvalidFormat,

    #[error("JWT payload is not valid base64url")]
    InvalidBase64,

    #[error("JWT payload is not valid claims JSON: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
pub(crate) fn make_unsigned_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(b"fake-signature");
    format!("{header}.{payload}.{sig}")
}
