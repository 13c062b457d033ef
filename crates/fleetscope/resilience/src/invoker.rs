//! Circuit breaker + retry wrapper for arbitrary remote calls.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
use crate::config::{CircuitBreakerConfig, ResilienceConfig};
use crate::error::{Classify, ResilienceError};
use crate::retry::RetryPolicy;

/// Runs operations under a per-resource circuit breaker and a shared
/// retry policy.
///
/// Breakers are created on first use of a resource name and live as long
/// as the invoker. The invoker is independent of the aggregator and can
/// guard any outbound call.
pub struct ResilientInvoker {
    breaker_config: CircuitBreakerConfig,
    retry: RetryPolicy,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl ResilientInvoker {
    pub fn new(config: ResilienceConfig) -> Self {
        Self::with_policies(config.circuit_breaker, config.retry)
    }

    pub fn with_policies(breaker_config: CircuitBreakerConfig, retry: RetryPolicy) -> Self {
        Self {
            breaker_config,
            retry,
            breakers: DashMap::new(),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Get or create the circuit breaker for a resource.
    pub fn breaker(&self, resource: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(resource) {
            return existing.clone();
        }
        self.breakers
            .entry(resource.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(resource, self.breaker_config.clone()))
            })
            .clone()
    }

    /// Run `operation` against `resource`.
    ///
    /// Rejected calls fail with [`ResilienceError::CircuitOpen`] without
    /// running the operation. Failures are retried while the policy allows
    /// and the breaker stays closed; the last failure is returned as
    /// [`ResilienceError::Exhausted`].
    pub async fn invoke<T, E, F, Fut>(
        &self,
        resource: &str,
        mut operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Classify + 'static,
    {
        let breaker = self.breaker(resource);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            breaker.try_acquire()?;

            match operation().await {
                Ok(value) => {
                    breaker.record_success();
                    if attempt > 1 {
                        debug!(resource, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    breaker.record_failure();

                    // No point backing off for a call the breaker will reject.
                    let tripped = breaker.state() == CircuitState::Open;
                    let next_delay = if tripped {
                        None
                    } else {
                        self.retry.next_delay(attempt, &error)
                    };

                    if let Some(delay) = next_delay {
                        debug!(
                            resource,
                            attempt,
                            kind = %error.kind(),
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying failed call"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    warn!(
                        resource,
                        attempts = attempt,
                        kind = %error.kind(),
                        circuit_open = tripped,
                        error = %error,
                        "Call failed"
                    );
                    return Err(ResilienceError::Exhausted {
                        resource: resource.to_string(),
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }

    /// Statistics for every breaker created so far, sorted by resource.
    pub fn breaker_stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<_> = self.breakers.iter().map(|b| b.value().stats()).collect();
        stats.sort_by(|a, b| a.resource.cmp(&b.resource));
        stats
    }

    /// Reset the breaker for a resource, if one exists.
    pub fn reset(&self, resource: &str) {
        if let Some(breaker) = self.breakers.get(resource) {
            breaker.reset();
        }
    }
}

impl Default for ResilientInvoker {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn invoker(threshold: u32, retry: RetryPolicy) -> ResilientInvoker {
        ResilientInvoker::with_policies(
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_threshold: 3,
                open_timeout: Duration::from_secs(60),
            },
            retry,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_timing() {
        let invoker = invoker(10, RetryPolicy::new(3, Duration::from_secs(1), 2.0));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<u32, ResilienceError<RemoteError>> = invoker
            .invoke("host:a", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(RemoteError::network("connection reset"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let invoker = invoker(10, RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = invoker
            .invoke("host:a", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::authentication("token rejected")) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            ResilienceError::Exhausted { resource, .. } => assert_eq!(resource, "host:a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_wrapped() {
        let invoker = invoker(10, RetryPolicy::new(3, Duration::from_millis(10), 2.0));

        let result: Result<(), _> = invoker
            .invoke("host:b", || async { Err(RemoteError::timeout("no answer")) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_source(), Some(RemoteError::timeout("no answer")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_without_calling() {
        let invoker = invoker(2, RetryPolicy::no_retry());
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let _: Result<(), _> = invoker
                .invoke("host:c", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(RemoteError::network("down")) }
                })
                .await;
        }
        assert_eq!(invoker.breaker("host:c").state(), CircuitState::Open);

        let result: Result<(), _> = invoker
            .invoke("host:c", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), RemoteError>(()) }
            })
            .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Other resources are unaffected.
        let other: Result<u8, ResilienceError<RemoteError>> =
            invoker.invoke("host:d", || async { Ok(7) }).await;
        assert_eq!(other.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_mid_retry_stops_retries() {
        let invoker = invoker(2, RetryPolicy::new(5, Duration::from_secs(1), 2.0));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = invoker
            .invoke("host:e", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::network("down")) }
            })
            .await;

        // Only the first backoff is slept; the tripping failure is returned.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(invoker.breaker("host:e").state(), CircuitState::Open);

        let err = result.unwrap_err();
        assert!(!err.is_circuit_open());
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.into_source(), Some(RemoteError::network("down")));
    }

    #[test]
    fn test_breaker_created_once_per_resource() {
        let invoker = ResilientInvoker::default();
        let a1 = invoker.breaker("host:a");
        let a2 = invoker.breaker("host:a");
        invoker.breaker("host:b");

        assert!(Arc::ptr_eq(&a1, &a2));
        let stats = invoker.breaker_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].resource, "host:a");
    }
}
