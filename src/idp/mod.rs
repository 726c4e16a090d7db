//! Identity provider integration: token decoding, PKCE material, the HTTP
//! client for the token and revocation endpoints, and the advisory breaker
//! that tracks upstream health.

pub mod breaker;
pub mod claims;
pub mod client;
pub mod pkce;
