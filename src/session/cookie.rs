//! HMAC-SHA256 signed cookie values, chunking, and `Set-Cookie` formatting.
//!
//! Signed value format: `base64url(payload).base64url(hmac(secret, payload))`.
//! Values longer than [`CHUNK_SIZE`] are split across `name.0`, `name.1`, ...
//! so the full session survives browser per-cookie size limits.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Largest value written into a single cookie (browsers cap name+value near 4096).
pub const CHUNK_SIZE: usize = 3800;

/// Sign a payload, returning the cookie value.
pub fn sign(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid");
    mac.update(payload);
    let signature = mac.finalize().into_bytes();

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Verify a signed cookie value and return the payload.
///
/// Returns `None` if the signature is invalid or the format is wrong.
pub fn verify(secret: &[u8], value: &str) -> Option<Vec<u8>> {
    let (payload_part, sig_part) = value.split_once('.')?;

    let payload = URL_SAFE_NO_PAD.decode(payload_part).ok()?;
    let expected_sig = URL_SAFE_NO_PAD.decode(sig_part).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid");
    mac.update(&payload);
    mac.verify_slice(&expected_sig).ok()?;

    Some(payload)
}

/// All `name=value` pairs from a `Cookie` header.
pub fn parse_cookies(header: &str) -> Vec<(&str, &str)> {
    header
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            Some((name.trim(), value.trim()))
        })
        .collect()
}

/// Parse a specific cookie from a `Cookie` header value.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    parse_cookies(header)
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v)
}

/// Split a value into `(cookie_name, chunk)` pairs.
///
/// A value that fits is stored under `base` itself; longer values use
/// `base.0`, `base.1`, ...
pub fn chunk(base: &str, value: &str) -> Vec<(String, String)> {
    if value.len() <= CHUNK_SIZE {
        return vec![(base.to_string(), value.to_string())];
    }
    // Signed values are base64url plus '.', so byte offsets are char boundaries.
    value
        .as_bytes()
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, part)| {
            (
                format!("{base}.{i}"),
                String::from_utf8_lossy(part).into_owned(),
            )
        })
        .collect()
}

/// Reassemble a value from request cookies. Unchunked wins if present.
pub fn reassemble(cookies: &[(&str, &str)], base: &str) -> Option<String> {
    if let Some((_, value)) = cookies.iter().find(|(n, _)| *n == base) {
        return Some(value.to_string());
    }

    let mut chunks: Vec<(usize, &str)> = cookies
        .iter()
        .filter_map(|(name, value)| {
            let index = name.strip_prefix(base)?.strip_prefix('.')?;
            Some((index.parse().ok()?, *value))
        })
        .collect();
    if chunks.is_empty() {
        return None;
    }
    chunks.sort_by_key(|(i, _)| *i);
    // A gap means a chunk went missing; the signature would fail anyway.
    if chunks.iter().enumerate().any(|(expected, (i, _))| expected != *i) {
        return None;
    }
    Some(chunks.into_iter().map(|(_, v)| v).collect())
}

/// Names of `base` and its chunks present in the request.
pub fn present_names(cookies: &[(&str, &str)], base: &str) -> Vec<String> {
    cookies
        .iter()
        .filter(|(name, _)| {
            *name == base
                || name
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|idx| idx.parse::<usize>().is_ok())
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Attributes shared by every cookie this crate emits.
#[derive(Debug, Clone)]
pub struct CookieAttrs<'a> {
    pub path: &'a str,
    pub https_only: bool,
    pub domain: Option<&'a str>,
}

pub fn make_set_cookie(name: &str, value: &str, max_age_secs: u64, attrs: &CookieAttrs<'_>) -> String {
    let mut parts = vec![
        format!("{name}={value}"),
        format!("Max-Age={max_age_secs}"),
        format!("Path={}", attrs.path),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if attrs.https_only {
        parts.push("Secure".into());
    }
    if let Some(domain) = attrs.domain {
        parts.push(format!("Domain={domain}"));
    }
    parts.join("; ")
}

pub fn make_delete_cookie(name: &str, attrs: &CookieAttrs<'_>) -> String {
    make_set_cookie(name, "", 0, attrs)
}
