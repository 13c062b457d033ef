//! Resilience configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Configuration for the resilience layer as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Breaker settings applied to every resource.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry settings applied to every invocation.
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit.
    pub recovery_threshold: u32,

    /// How long the circuit stays open before admitting a probe.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            recovery_threshold: 3,
            open_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 10);
        assert_eq!(config.recovery_threshold, 3);
        assert_eq!(config.open_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_resilience_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.circuit_breaker, CircuitBreakerConfig::default());
    }
}
