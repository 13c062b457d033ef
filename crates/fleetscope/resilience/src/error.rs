//! Error taxonomy for remote calls and the resilience layer.
//!
//! Transport-specific errors are mapped onto [`ErrorKind`] at the client
//! boundary; everything in this crate reasons about kinds only.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, reset, DNS failure.
    Network,

    /// Request did not complete in time.
    Timeout,

    /// Remote answered but is temporarily unable to serve (5xx, 429).
    Unavailable,

    /// Credentials rejected.
    Authentication,

    /// Request or response failed validation.
    Validation,

    /// Requested item does not exist on the remote.
    NotFound,
}

impl ErrorKind {
    /// Whether failures of this kind may succeed on a later attempt.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Unavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::NotFound => write!(f, "not-found"),
        }
    }
}

/// Errors that can report their [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Failure returned by a remote management host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl Classify for RemoteError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Fast-fail signal from an open circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker open for {resource}; retry after {retry_after_secs}s")]
pub struct CircuitOpenError {
    pub resource: String,
    pub retry_after: Duration,
    /// `retry_after` rounded up to whole seconds.
    pub retry_after_secs: u64,
}

impl CircuitOpenError {
    pub fn new(resource: impl Into<String>, retry_after: Duration) -> Self {
        let mut retry_after_secs = retry_after.as_secs();
        if retry_after.subsec_nanos() > 0 {
            retry_after_secs += 1;
        }
        Self {
            resource: resource.into(),
            retry_after,
            retry_after_secs,
        }
    }
}

impl Classify for CircuitOpenError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Unavailable
    }
}

/// Error returned by [`ResilientInvoker::invoke`](crate::ResilientInvoker::invoke).
#[derive(Debug, Error)]
pub enum ResilienceError<E: std::error::Error + 'static> {
    /// The breaker rejected the call; the operation was not run.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The operation failed and no further attempt was made.
    #[error("{resource} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        resource: String,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E: std::error::Error + 'static> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }

    /// Number of attempts made, 0 when the breaker rejected the call.
    pub fn attempts(&self) -> u32 {
        match self {
            ResilienceError::CircuitOpen(_) => 0,
            ResilienceError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            ResilienceError::CircuitOpen(_) => None,
            ResilienceError::Exhausted { source, .. } => Some(source),
        }
    }
}

impl<E: std::error::Error + Classify + 'static> Classify for ResilienceError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::CircuitOpen(e) => e.kind(),
            ResilienceError::Exhausted { source, .. } => source.kind(),
        }
    }
}
