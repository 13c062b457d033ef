//! Configuration for fleetscope-daemon

use std::path::PathBuf;
use std::time::Duration;

use fleetscope_aggregator::AggregatorConfig;
use fleetscope_resilience::{CircuitBreakerConfig, ErrorKind, ResilienceConfig, RetryPolicy};
use fleetscope_types::RemoteHost;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Remote management hosts to poll
    #[serde(default)]
    pub hosts: Vec<RemoteHost>,

    /// Poll loop configuration
    #[serde(default)]
    pub aggregator: PollConfig,

    /// Circuit breaker configuration, applied per resource
    #[serde(default)]
    pub circuit_breaker: BreakerConfig,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Summary persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between the end of one cycle and the start of the next
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds shutdown waits for an in-flight cycle
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            join_timeout_secs: default_join_timeout(),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes before the circuit closes
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,

    /// Seconds an open circuit rejects calls
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_threshold: default_recovery_threshold(),
            open_timeout_secs: default_open_timeout(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Error kinds worth another attempt
    #[serde(default = "default_retryable")]
    pub retryable: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay(),
            retryable: default_retryable(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Summary persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// JSON-lines file each summary is appended to; disabled when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_poll_interval() -> u64 {
    30
}

fn default_join_timeout() -> u64 {
    10
}

fn default_failure_threshold() -> u32 {
    10
}

fn default_recovery_threshold() -> u32 {
    3
}

fn default_open_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_retryable() -> Vec<ErrorKind> {
    vec![ErrorKind::Network, ErrorKind::Timeout, ErrorKind::Unavailable]
}

fn default_request_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `FLEETSCOPE_`-prefixed environment variables (`__` separates
    /// nested keys, e.g. `FLEETSCOPE_AGGREGATOR__POLL_INTERVAL_SECS`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FLEETSCOPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> DaemonResult<()> {
        if self.aggregator.poll_interval_secs == 0 {
            return Err(DaemonError::Config(
                "aggregator.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(DaemonError::Config(
                "circuit_breaker.failure_threshold must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(DaemonError::Config(
                "retry.max_attempts must be positive".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(DaemonError::Config(
                "retry.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        for host in &self.hosts {
            if host.id.as_str().is_empty() || host.address.is_empty() {
                return Err(DaemonError::Config(format!(
                    "host '{}' needs both an id and an address",
                    host.name
                )));
            }
        }
        Ok(())
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            poll_interval: Duration::from_secs(self.aggregator.poll_interval_secs),
            join_timeout: Duration::from_secs(self.aggregator.join_timeout_secs),
        }
    }

    pub fn resilience_config(&self) -> ResilienceConfig {
        ResilienceConfig {
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: self.circuit_breaker.failure_threshold,
                recovery_threshold: self.circuit_breaker.recovery_threshold,
                open_timeout: Duration::from_secs(self.circuit_breaker.open_timeout_secs),
            },
            retry: RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.base_delay_ms),
                self.retry.backoff_multiplier,
            )
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_retryable(self.retry.retryable.iter().copied()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }
}
