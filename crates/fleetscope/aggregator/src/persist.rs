//! Durable storage hook for completed cycles.

use async_trait::async_trait;
use fleetscope_types::FleetSummary;

use crate::error::PersistError;

/// Stores fleet summaries somewhere durable.
///
/// Called once per completed cycle; a failure is logged and does not affect
/// the cycle.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn save(&self, summary: &FleetSummary) -> Result<(), PersistError>;
}
