//! Circuit breaker pattern for remote resources.
//!
//! Prevents one unhealthy remote from soaking up every poll cycle by
//! tracking consecutive failures and failing fast while the resource is
//! judged unhealthy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CircuitBreakerConfig;
use crate::error::CircuitOpenError;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,

    /// Circuit is open, requests are rejected.
    Open,

    /// Circuit is probing whether the resource has recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

struct BreakerInner {
    state: CircuitState,

    /// Consecutive failures while closed.
    failure_count: u32,

    /// Consecutive successes while half-open.
    success_count: u32,

    last_failure: Option<DateTime<Utc>>,

    /// Monotonic deadline after which an open circuit admits a probe.
    next_retry: Option<Instant>,

    /// Wall-clock mirror of `next_retry`, for reporting.
    next_retry_at: Option<DateTime<Utc>>,

    /// When the outstanding half-open probe was admitted.
    probe_started: Option<Instant>,

    last_transition: DateTime<Utc>,
}

/// Circuit breaker for a single named resource.
///
/// - Closed: calls are admitted; `failure_threshold` consecutive failures open it.
/// - Open: calls are rejected until `open_timeout` has elapsed.
/// - Half-Open: one probe at a time is admitted; `recovery_threshold`
///   successes close the circuit, any failure reopens it.
///
/// Every breaker owns its own lock, so breakers for different resources
/// never contend.
pub struct CircuitBreaker {
    resource: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new, closed circuit breaker.
    pub fn new(resource: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            resource: resource.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
                next_retry: None,
                next_retry_at: None,
                probe_started: None,
                last_transition: Utc::now(),
            }),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Does not perform the open -> half-open transition;
    /// that only happens when a call is admitted.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Ask to run one call against the resource.
    ///
    /// On `Ok` the caller must report the outcome with
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let probe_started = inner.probe_started;

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let next_retry = inner.next_retry.unwrap_or(now);
                if now >= next_retry {
                    info!(
                        resource = %self.resource,
                        "Circuit breaker half-open, admitting probe"
                    );
                    self.transition_to(&mut inner, CircuitState::HalfOpen);
                    inner.probe_started = Some(now);
                    Ok(())
                } else {
                    Err(CircuitOpenError::new(
                        self.resource.clone(),
                        next_retry - now,
                    ))
                }
            }
            CircuitState::HalfOpen => match probe_started {
                // A probe that never reported back is treated as lost.
                Some(started) if now.duration_since(started) < self.config.open_timeout => {
                    Err(CircuitOpenError::new(self.resource.clone(), Duration::ZERO))
                }
                _ => {
                    inner.probe_started = Some(now);
                    Ok(())
                }
            },
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();

        let state = inner.state;
        match state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.probe_started = None;
                inner.success_count += 1;

                if inner.success_count >= self.config.recovery_threshold.max(1) {
                    info!(
                        resource = %self.resource,
                        successes = inner.success_count,
                        "Circuit breaker closing after successful recovery"
                    );
                    self.transition_to(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                debug!(resource = %self.resource, "Success recorded while circuit open");
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Utc::now());

        let state = inner.state;
        match state {
            CircuitState::Closed => {
                inner.failure_count += 1;

                if inner.failure_count >= self.config.failure_threshold.max(1) {
                    warn!(
                        resource = %self.resource,
                        failures = inner.failure_count,
                        "Circuit breaker opening due to failures"
                    );
                    self.transition_to(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    resource = %self.resource,
                    "Circuit breaker re-opening after half-open failure"
                );
                inner.failure_count = 0;
                self.transition_to(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the circuit to a specific state.
    pub fn force_state(&self, new_state: CircuitState) {
        let mut inner = self.inner.lock();
        info!(
            resource = %self.resource,
            old_state = %inner.state,
            new_state = %new_state,
            "Circuit breaker state forced"
        );
        self.transition_to(&mut inner, new_state);
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        self.force_state(CircuitState::Closed);
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            resource: self.resource.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure: inner.last_failure,
            next_retry_at: inner.next_retry_at,
            last_transition: inner.last_transition,
        }
    }

    fn transition_to(&self, inner: &mut BreakerInner, new_state: CircuitState) {
        inner.state = new_state;
        inner.last_transition = Utc::now();
        inner.probe_started = None;

        match new_state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.next_retry = None;
                inner.next_retry_at = None;
            }
            CircuitState::Open => {
                inner.success_count = 0;
                inner.next_retry = Some(Instant::now() + self.config.open_timeout);
                inner.next_retry_at = chrono::Duration::from_std(self.config.open_timeout)
                    .ok()
                    .map(|timeout| Utc::now() + timeout);
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
            }
        }
    }
}

/// Point-in-time view of a circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub resource: String,
    pub state: CircuitState,

    /// Consecutive failures recorded while closed.
    pub failure_count: u32,

    /// Consecutive successes recorded while half-open.
    pub success_count: u32,

    pub last_failure: Option<DateTime<Utc>>,

    /// When an open circuit will admit its next probe.
    pub next_retry_at: Option<DateTime<Utc>>,

    pub last_transition: DateTime<Utc>,
}
