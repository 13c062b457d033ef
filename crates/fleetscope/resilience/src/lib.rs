//! # fleetscope-resilience
//!
//! Failure isolation for calls to remote management hosts.
//!
//! - [`CircuitBreaker`]: per-resource CLOSED / OPEN / HALF_OPEN state machine
//! - [`RetryPolicy`]: bounded exponential backoff with error classification
//! - [`ResilientInvoker`]: runs any async operation under both
//!
//! Failures are classified through [`ErrorKind`]; transport crates map their
//! own errors onto it at the client boundary, so nothing here depends on a
//! particular transport.
//!
//! ```rust,no_run
//! use fleetscope_resilience::{RemoteError, ResilienceConfig, ResilientInvoker};
//!
//! # async fn example() {
//! let invoker = ResilientInvoker::new(ResilienceConfig::default());
//! let result = invoker
//!     .invoke("host:pve1", || async { Ok::<_, RemoteError>(42) })
//!     .await;
//! assert_eq!(result.unwrap(), 42);
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod invoker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use config::{CircuitBreakerConfig, ResilienceConfig};
pub use error::{Classify, CircuitOpenError, ErrorKind, RemoteError, ResilienceError};
pub use invoker::ResilientInvoker;
pub use retry::RetryPolicy;
