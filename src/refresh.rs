//! Access-token freshness and the refresh state machine.
//!
//! [`classify`] is a pure function of the session and the clock. The
//! [`RefreshCoordinator`] performs the upstream call and always produces a
//! complete replacement session, so the handle is updated in one step.
//!
//! Concurrent requests for the same user (several tabs) are single-flighted
//! per subject. A successful result is remembered briefly under a digest of
//! the refresh token it consumed, so a request that arrives holding the
//! rotated-out token receives the same new session instead of failing.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::idp::client::IdpClient;
use crate::login::complete_login;
use crate::ocsf;
use crate::session::middleware::SessionHandle;
use crate::session::{Session, SessionError, now_millis};

/// How long a successful refresh result is reused for racing requests.
pub const RESULT_MEMO_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// More than the buffer remains before expiry.
    Fresh,
    /// Within the buffer (or past expiry) and refreshable.
    Expiring,
    /// Nothing to refresh with; the session passes through unchanged.
    NoRefreshToken,
    /// Already failed; never refreshed again.
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    NoRefreshToken,
    Refreshed(Session),
    Failed(Session),
}

pub fn classify(session: &Session, now_ms: u64, buffer: Duration) -> RefreshState {
    if session.error.is_some() {
        return RefreshState::Errored;
    }
    if session.refresh_token.as_deref().is_none_or(str::is_empty) {
        return RefreshState::NoRefreshToken;
    }
    let refresh_at = session
        .access_token_expires_at
        .saturating_sub(buffer.as_millis() as u64);
    if now_ms >= refresh_at {
        RefreshState::Expiring
    } else {
        RefreshState::Fresh
    }
}

/// True iff a refresh token is present, the session is not errored, and
/// `now >= expires_at - buffer`.
pub fn should_refresh(session: &Session, now_ms: u64, buffer: Duration) -> bool {
    classify(session, now_ms, buffer) == RefreshState::Expiring
}

struct MemoEntry {
    expires_at: u64,
    session: Session,
}

pub struct RefreshCoordinator {
    idp: Arc<IdpClient>,
    buffer: Duration,
    default_lifetime: Duration,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    recent: DashMap<[u8; 32], MemoEntry>,
}

impl RefreshCoordinator {
    pub fn new(idp: Arc<IdpClient>, buffer: Duration, default_lifetime: Duration) -> Self {
        Self {
            idp,
            buffer,
            default_lifetime,
            inflight: DashMap::new(),
            recent: DashMap::new(),
        }
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    /// Bring the request's session up to date, at most once per request.
    ///
    /// Returns the session as it stands afterwards. A failed refresh leaves
    /// an errored session in the handle; callers decide what to do with it.
    pub async fn ensure_fresh(&self, handle: &SessionHandle) -> Option<Session> {
        let mut checked = handle.refresh_gate().await;
        let session = handle.get().await?;
        if *checked {
            return Some(session);
        }
        *checked = true;

        if classify(&session, now_millis(), self.buffer) != RefreshState::Expiring {
            return Some(session);
        }
        match self.refresh(&session).await {
            RefreshOutcome::Refreshed(next) | RefreshOutcome::Failed(next) => {
                handle.replace(next.clone()).await;
                Some(next)
            }
            RefreshOutcome::NoRefreshToken => Some(session),
        }
    }

    /// Refresh regardless of remaining lifetime and store the result.
    pub async fn force_refresh(&self, handle: &SessionHandle, session: &Session) -> RefreshOutcome {
        let mut checked = handle.refresh_gate().await;
        *checked = true;
        let outcome = self.refresh(session).await;
        if let RefreshOutcome::Refreshed(next) | RefreshOutcome::Failed(next) = &outcome {
            handle.replace(next.clone()).await;
        }
        outcome
    }

    /// Exchange the session's refresh token for a new session.
    pub async fn refresh(&self, session: &Session) -> RefreshOutcome {
        if session.error.is_some() {
            return RefreshOutcome::Failed(session.clone());
        }
        let Some(refresh_token) = session.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
            return RefreshOutcome::NoRefreshToken;
        };

        let digest: [u8; 32] = Sha256::digest(refresh_token.as_bytes()).into();
        if let Some(next) = self.memoized(&digest) {
            tracing::debug!(subject = %session.subject, "Reusing recent refresh result");
            return RefreshOutcome::Refreshed(next);
        }

        let key = if session.subject.is_empty() {
            URL_SAFE_NO_PAD.encode(digest)
        } else {
            session.subject.clone()
        };
        let lock = self.inflight.entry(key.clone()).or_default().clone();
        let outcome = {
            let _guard = lock.lock().await;
            // Another request may have finished the same refresh while we waited.
            match self.memoized(&digest) {
                Some(next) => RefreshOutcome::Refreshed(next),
                None => self.call_provider(session, refresh_token, digest).await,
            }
        };
        drop(lock);
        self.inflight.remove_if(&key, |_, m| Arc::strong_count(m) == 1);
        outcome
    }

    async fn call_provider(&self, session: &Session, refresh_token: &str, digest: [u8; 32]) -> RefreshOutcome {
        let who = ocsf::Actor::of(session);
        match self.idp.refresh(refresh_token).await {
            Ok(tokens) => {
                let now = now_millis();
                let mut next = complete_login(&tokens, session.auth_method, now, self.default_lifetime);
                next.issued_at = session.issued_at;
                if next.refresh_token.is_none() {
                    next.refresh_token = session.refresh_token.clone();
                }
                if next.id_token.is_none() {
                    next.id_token = session.id_token.clone();
                }
                if next.subject.is_empty() {
                    next.subject = session.subject.clone();
                }
                if next.email.is_none() {
                    next.email = session.email.clone();
                }
                if next.name.is_none() {
                    next.name = session.name.clone();
                }

                tracing::info!(
                    subject = %next.subject,
                    expires_at = next.access_token_expires_at,
                    roles = %crate::roles::join(&next.roles),
                    "Access token refreshed"
                );
                ocsf::authentication_event(
                    ocsf::ACTIVITY_SERVICE_TICKET,
                    "Service Ticket",
                    ocsf::STATUS_SUCCESS,
                    ocsf::SEVERITY_INFORMATIONAL,
                    who,
                    Some(session.auth_method),
                    "Token refresh succeeded",
                );

                self.recent.retain(|_, entry| entry.expires_at > now);
                self.recent.insert(
                    digest,
                    MemoEntry {
                        expires_at: now + RESULT_MEMO_TTL.as_millis() as u64,
                        session: next.clone(),
                    },
                );
                RefreshOutcome::Refreshed(next)
            }
            Err(e) => {
                if self.idp.breaker().is_open() {
                    tracing::warn!("Identity provider breaker is open");
                }
                tracing::warn!(subject = %session.subject, error = %e, "Token refresh failed");
                ocsf::authentication_event(
                    ocsf::ACTIVITY_SERVICE_TICKET,
                    "Service Ticket",
                    ocsf::STATUS_FAILURE,
                    ocsf::SEVERITY_MEDIUM,
                    who,
                    Some(session.auth_method),
                    &format!("Token refresh failed: {e}"),
                );
                RefreshOutcome::Failed(session.clone().into_failed(SessionError::RefreshFailed))
            }
        }
    }

    fn memoized(&self, digest: &[u8; 32]) -> Option<Session> {
        let entry = self.recent.get(digest)?;
        (entry.expires_at > now_millis()).then(|| entry.session.clone())
    }
}
