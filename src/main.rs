//! Dual-mode entrypoint: Lambda or local dev server.
//!
//! Detects Lambda runtime via `AWS_LAMBDA_RUNTIME_API` env var.
//! - Lambda: `lambda_http::run(app)` (API Gateway v2 to HTTP)
//! - Local: `axum::serve(listener, app)` on a plain TCP listener

use axum::Router;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use storefront_auth::config::Config;
use storefront_auth::{AppState, create_app};

#[tokio::main]
async fn main() {
    let is_lambda = env::var("AWS_LAMBDA_RUNTIME_API").is_ok();

    // Init tracing: JSON for Lambda, pretty for local
    if is_lambda {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        // Load .env for local dev
        let _ = dotenvy::dotenv();
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let config = Config::from_env().expect("Failed to load configuration");
    if !config.session_https_only {
        tracing::warn!("SESSION_HTTPS_ONLY=false; session cookies will be sent over plain HTTP");
    }
    tracing::info!(
        issuer = %config.idp_issuer,
        refresh_buffer_secs = config.refresh_buffer_secs,
        idp_timeout_ms = config.idp_timeout_ms,
        "Configuration loaded"
    );

    let port = config.port;
    let state = Arc::new(AppState::new(config));
    let app = create_app(state, Router::new());

    if is_lambda {
        tracing::info!("Starting in Lambda mode");
        lambda_http::run(app).await.expect("Lambda runtime error");
    } else {
        let addr = format!("0.0.0.0:{port}");
        tracing::info!("Starting local server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind");
        axum::serve(listener, app).await.expect("Server error");
    }
}
