//! Logout: best-effort upstream revocation, unconditional local clear.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::idp::client::{IdpClient, IdpError};
use crate::ocsf;
use crate::session::middleware::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogoutOutcome {
    /// The provider confirmed revocation of the refresh token.
    pub revoked: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LogoutError {
    #[error("Refresh token revocation failed after {attempts} attempt(s): {source}")]
    RevocationFailed {
        attempts: u32,
        #[source]
        source: IdpError,
    },
}

pub struct LogoutCoordinator {
    idp: Arc<IdpClient>,
    max_retries: u32,
    backoff: Duration,
}

impl LogoutCoordinator {
    pub fn new(idp: Arc<IdpClient>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            idp,
            max_retries,
            backoff,
        }
    }

    /// Destroy the local session, then try to revoke its refresh token.
    ///
    /// Never fails: revocation errors are logged and reported through
    /// [`LogoutOutcome::revoked`].
    pub async fn logout(&self, handle: &SessionHandle) -> LogoutOutcome {
        let session = handle.get().await;
        handle.destroy().await;

        let who = session.as_ref().map(ocsf::Actor::of).unwrap_or_default();
        let method = session.as_ref().map(|s| s.auth_method);

        let revoked = match session.as_ref().and_then(|s| s.refresh_token.as_deref()) {
            Some(refresh_token) => match self.revoke(refresh_token).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Logout continued without upstream revocation");
                    ocsf::authentication_event(
                        ocsf::ACTIVITY_LOGOFF,
                        "Logoff",
                        ocsf::STATUS_FAILURE,
                        ocsf::SEVERITY_LOW,
                        who,
                        method,
                        &format!("Revocation failed: {e}"),
                    );
                    false
                }
            },
            None => false,
        };

        ocsf::authentication_event(
            ocsf::ACTIVITY_LOGOFF,
            "Logoff",
            ocsf::STATUS_SUCCESS,
            ocsf::SEVERITY_INFORMATIONAL,
            who,
            method,
            "User logged out",
        );
        LogoutOutcome { revoked }
    }

    /// Revoke with bounded retries on transient failures.
    ///
    /// Retries back off linearly and stop early while the breaker is open.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), LogoutError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.idp.revoke(refresh_token).await {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.is_transient()
                        && attempts <= self.max_retries
                        && !self.idp.breaker().is_open() =>
                {
                    tracing::debug!(attempt = attempts, error = %e, "Revocation failed, retrying");
                    tokio::time::sleep(self.backoff * attempts).await;
                }
                Err(source) => return Err(LogoutError::RevocationFailed { attempts, source }),
            }
        }
    }
}
