//! Storefront auth: session lifecycle, token refresh and route guarding.
//!
//! Same Axum router runs in both Lambda and local dev contexts.
//! Detection via `AWS_LAMBDA_RUNTIME_API` env var.

pub mod config;
pub mod error;
pub mod guard;
pub mod idp;
pub mod login;
pub mod logout;
pub mod middleware;
pub mod ocsf;
pub mod refresh;
pub mod roles;
pub mod routes;
pub mod session;
pub mod types;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::guard::RouteRules;
use crate::guard::middleware::route_guard;
use crate::idp::breaker::IdpBreaker;
use crate::idp::client::IdpClient;
use crate::logout::LogoutCoordinator;
use crate::refresh::RefreshCoordinator;
use crate::session::middleware::session_middleware;
use crate::session::store::SessionStore;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    pub idp: Arc<IdpClient>,
    pub refresher: RefreshCoordinator,
    pub logout: LogoutCoordinator,
    pub routes: RouteRules,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: Config, http: reqwest::Client) -> Self {
        let breaker = Arc::new(IdpBreaker::from_config(&config));
        let idp = Arc::new(IdpClient::new(&config, http, breaker));
        Self {
            sessions: Arc::new(SessionStore::from_config(&config)),
            refresher: RefreshCoordinator::new(
                idp.clone(),
                config.refresh_buffer(),
                config.default_token_lifetime(),
            ),
            logout: LogoutCoordinator::new(
                idp.clone(),
                config.revoke_max_retries,
                Duration::from_millis(config.revoke_backoff_ms),
            ),
            routes: RouteRules::default(),
            idp,
            config,
        }
    }
}

/// Build the Axum router with all middleware and routes.
///
/// `pages` holds the storefront's own routes; they sit behind the route
/// guard like everything else. Layer order, outermost first: tracing,
/// session persistence, route guard.
pub fn create_app(state: Arc<AppState>, pages: Router<Arc<AppState>>) -> Router {
    let sessions = state.sessions.clone();

    // Auth routes that require CSRF protection
    let csrf_routes = Router::new()
        .route(
            "/callback/credentials",
            post(routes::credentials::credentials_login),
        )
        .route("/refresh", post(routes::refresh::refresh_tokens))
        .route("/signout", post(routes::logout::logout))
        .layer(from_fn(crate::middleware::csrf::require_csrf));

    // Auth routes without CSRF
    let open_auth_routes = Router::new()
        .route("/signin", get(routes::signin::signin))
        .route("/callback/idp", get(routes::callback::idp_callback))
        .route("/me", get(routes::me::me));

    let auth_routes = Router::new().merge(csrf_routes).merge(open_auth_routes);

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/auth", auth_routes)
        .merge(pages)
        .layer(from_fn_with_state(state.clone(), route_guard))
        .layer(from_fn(move |req, next| {
            let store = sessions.clone();
            session_middleware(store, req, next)
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
