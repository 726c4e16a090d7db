//! Axum route guard layer.
//!
//! Runs inside the session middleware so that any session change it makes
//! (a refresh, or clearing an errored session) is persisted on the way out.

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

use super::{
    ACCESS_DENIED_PATH, GuardDecision, HOME_PATH, Identity, LOGIN_PATH, RouteClass,
    USER_ID_HEADER, USER_ROLES_HEADER,
};
use crate::AppState;
use crate::error::AppError;
use crate::ocsf;
use crate::roles;
use crate::session::middleware::SessionHandle;

pub async fn route_guard(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    // Downstream handlers trust these; only the guard may set them.
    let headers = req.headers_mut();
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_ROLES_HEADER);

    let path = req.uri().path().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let class = state.routes.classify(&path);
    if class == RouteClass::Bypass {
        return next.run(req).await;
    }

    let Some(handle) = req.extensions().get::<SessionHandle>().cloned() else {
        tracing::error!("Route guard installed without session middleware");
        return AppError::Internal("Session middleware not configured".into()).into_response();
    };

    // Freshness first: a refreshed token may carry different roles, and
    // public routes still forward identity downstream.
    let session = state.refresher.ensure_fresh(&handle).await;

    if let Some(s) = &session
        && !s.is_authenticated()
    {
        tracing::info!(
            subject = %s.subject,
            error = s.error.map(|e| e.as_str()).unwrap_or("empty_token"),
            "Clearing unusable session"
        );
        handle.destroy().await;
    }

    let decision = state.routes.decide(&class, &target, session.as_ref());
    let who = session.as_ref().map(ocsf::Actor::of).unwrap_or_default();

    match decision {
        GuardDecision::Allow(identity) => {
            if let Some(identity) = identity {
                tracing::debug!(path = %path, subject = %identity.subject, "Route guard allow");
                inject_identity(&mut req, identity);
            }
            next.run(req).await
        }
        GuardDecision::RedirectHome => Redirect::temporary(HOME_PATH).into_response(),
        GuardDecision::RedirectToLogin { callback_url } => {
            ocsf::access_event(&path, "redirect_login", "no usable session", who);
            let location = format!(
                "{LOGIN_PATH}?callbackUrl={}",
                urlencoding::encode(&callback_url)
            );
            Redirect::temporary(&location).into_response()
        }
        GuardDecision::Unauthorized { session_error } => {
            ocsf::access_event(&path, "unauthorized", "no usable session", who);
            let reason = if session_error { "session_error" } else { "no_session" };
            AppError::NotAuthenticated(reason).into_response()
        }
        GuardDecision::Forbidden { api } => {
            let required = match &class {
                RouteClass::Protected {
                    requirement: Some(requirement),
                } => requirement
                    .roles()
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join("|"),
                _ => String::new(),
            };
            tracing::warn!(path = %path, required = %required, "Route guard denied: missing role");
            ocsf::access_event(&path, "forbidden", &format!("requires {required}"), who);
            if api {
                AppError::Forbidden.into_response()
            } else {
                Redirect::temporary(ACCESS_DENIED_PATH).into_response()
            }
        }
    }
}

/// Request-side identity only; nothing here reaches the response.
fn inject_identity(req: &mut Request, identity: Identity) {
    let headers = req.headers_mut();
    match HeaderValue::from_str(&identity.subject) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(USER_ID_HEADER), value);
        }
        Err(_) => tracing::warn!("Subject is not a valid header value, skipping identity header"),
    }
    if let Ok(value) = HeaderValue::from_str(&roles::join(&identity.roles)) {
        headers.insert(HeaderName::from_static(USER_ROLES_HEADER), value);
    }
    req.extensions_mut().insert(identity);
}
