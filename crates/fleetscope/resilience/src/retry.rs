//! Bounded exponential-backoff retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Classify, ErrorKind};

/// Retry policy applied to failed remote calls.
///
/// `max_attempts` counts the first call, so `max_attempts == 1` disables
/// retrying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub base_delay: Duration,

    /// Factor applied to the delay after each further attempt.
    pub backoff_multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Error kinds worth retrying.
    pub retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            retryable: vec![ErrorKind::Network, ErrorKind::Timeout, ErrorKind::Unavailable],
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default retryable kinds and delay cap.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_multiplier,
            ..Default::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn is_retryable_kind(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    pub fn is_retryable<E: Classify + ?Sized>(&self, error: &E) -> bool {
        self.is_retryable_kind(error.kind())
    }

    /// Delay to wait after the given (1-based) failed attempt:
    /// `min(base_delay * backoff_multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.max(0.0).powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Delay before the next attempt, or `None` when the failure is final.
    pub fn next_delay<E: Classify + ?Sized>(&self, attempt: u32, error: &E) -> Option<Duration> {
        if attempt >= self.max_attempts || !self.is_retryable(error) {
            return None;
        }
        Some(self.delay_for(attempt))
    }
}
