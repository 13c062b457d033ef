//! Aggregator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub poll_interval: Duration,

    /// Upper bound `stop()` waits for the worker to finish.
    pub join_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            join_timeout: Duration::from_secs(10),
        }
    }
}
