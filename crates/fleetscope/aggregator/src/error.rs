//! Error types for fleetscope-aggregator.

use fleetscope_resilience::{RemoteError, ResilienceError};
use thiserror::Error;

/// Failure of the host registry collaborator.
#[derive(Debug, Error)]
#[error("host registry error: {0}")]
pub struct RegistryError(pub String);

/// Failure of the persistence collaborator.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence encoding error: {0}")]
    Encoding(String),

    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// Unexpected internal fault of a poll cycle.
///
/// Cycle errors are caught at the top of the worker loop and logged; the
/// worker sleeps one interval and carries on.
#[derive(Debug, Error)]
pub enum AggregationCycleError {
    /// The list of hosts could not be obtained.
    #[error("failed to list enabled hosts: {0}")]
    HostRegistry(#[from] RegistryError),

    /// The cycle body panicked.
    #[error("poll cycle panicked: {0}")]
    Panicked(String),
}

/// Failure while polling a single host.
///
/// Never escapes a cycle: it is recorded as the host snapshot's error.
#[derive(Debug, Error)]
pub enum HostPollError {
    /// No client could be built for the host.
    #[error("cannot create client: {0}")]
    Client(RemoteError),

    /// A host-level remote call failed or was rejected by its breaker.
    #[error(transparent)]
    Remote(#[from] ResilienceError<RemoteError>),
}

/// Error type subscriber callbacks may return.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for aggregation cycles.
pub type CycleResult<T> = Result<T, AggregationCycleError>;

/// Render a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
