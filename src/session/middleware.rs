//! Axum session middleware layer.
//!
//! Loads the cookie session before the handler runs, exposes it through a
//! [`SessionHandle`] in request extensions, and after the handler returns
//! writes or clears cookies depending on what changed:
//!
//! - destroyed: every session cookie is expired
//! - modified: the full session is rewritten and stale chunks are removed
//! - unchanged: nothing is emitted, unless the request carried cookies that
//!   failed to load, in which case they are cleared

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::Session;
use super::store::SessionStore;

/// Shared handle to session state, inserted into request extensions.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Option<Session>>>,
    destroyed: Arc<Mutex<bool>>,
    /// Held across a freshness check so it runs at most once per request.
    refresh_checked: Arc<Mutex<bool>>,
}

/// Extract SessionHandle from request extensions (put there by session middleware).
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = crate::error::AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(crate::error::AppError::Internal(
                "Session middleware not configured".into(),
            ))
    }
}

impl SessionHandle {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            destroyed: Arc::new(Mutex::new(false)),
            refresh_checked: Arc::new(Mutex::new(false)),
        }
    }

    /// Snapshot of the current session.
    pub async fn get(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Replace the whole session; it is persisted when the response is built.
    pub async fn replace(&self, session: Session) {
        *self.session.lock().await = Some(session);
        *self.destroyed.lock().await = false;
    }

    /// Drop the session and expire its cookies.
    pub async fn destroy(&self) {
        *self.session.lock().await = None;
        *self.destroyed.lock().await = true;
    }

    pub async fn is_destroyed(&self) -> bool {
        *self.destroyed.lock().await
    }

    pub(crate) async fn refresh_gate(&self) -> MutexGuard<'_, bool> {
        self.refresh_checked.lock().await
    }
}

/// Axum middleware function for session handling.
pub async fn session_middleware(store: Arc<SessionStore>, mut req: Request, next: Next) -> Response {
    let present = store.present_cookie_names(req.headers());
    let initial = store.read(req.headers());
    let handle = SessionHandle::new(initial.clone());
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;

    let destroyed = handle.is_destroyed().await;
    let current = handle.get().await;
    let headers = response.headers_mut();

    if destroyed {
        store.clear(headers, &present);
    } else if current != initial {
        match &current {
            Some(session) => store.write(headers, session, &present),
            None => store.clear(headers, &present),
        }
    } else if initial.is_none() && !present.is_empty() {
        tracing::debug!(cookies = present.len(), "Clearing unreadable session cookies");
        store.clear(headers, &present);
    }

    response
}
