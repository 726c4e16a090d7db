//! Advisory circuit breaker for identity provider calls.
//!
//! Counts consecutive transient failures. At the threshold it opens for a
//! cooldown, after which it reports half-open until a call succeeds or fails
//! again. Nothing consults it to decide a login or refresh result; callers
//! use it to log, to skip logout retries, and to report health.

use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::session::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
pub struct IdpBreaker {
    consecutive_failures: AtomicU32,
    /// Epoch ms when the breaker last opened; 0 while closed.
    opened_at: AtomicU64,
    threshold: u32,
    cooldown: Duration,
}

impl IdpBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.breaker_threshold,
            Duration::from_secs(config.breaker_cooldown_secs),
        )
    }

    pub fn record_success(&self) {
        let previous = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if self.opened_at.swap(0, Ordering::Relaxed) != 0 {
            tracing::info!(previous_failures = previous, "Identity provider recovered, breaker closed");
        }
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.threshold && self.state() != BreakerState::Open {
            self.opened_at.store(now_millis(), Ordering::Relaxed);
            tracing::warn!(
                failures,
                cooldown_secs = self.cooldown.as_secs(),
                "Identity provider breaker opened"
            );
        }
    }

    pub fn state(&self) -> BreakerState {
        let opened_at = self.opened_at.load(Ordering::Relaxed);
        if opened_at == 0 {
            return BreakerState::Closed;
        }
        let elapsed = now_millis().saturating_sub(opened_at);
        if u128::from(elapsed) < self.cooldown.as_millis() {
            BreakerState::Open
        } else {
            BreakerState::HalfOpen
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}
