//! HTTP route handlers.
//!
//! Everything except `health` is nested under `/api/auth`.

pub mod callback;
pub mod credentials;
pub mod health;
pub mod logout;
pub mod me;
pub mod refresh;
pub mod signin;
