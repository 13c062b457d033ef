//! # fleetscope-types
//!
//! Core data model for the fleetscope telemetry aggregator:
//!
//! - [`RemoteHost`]: a configured remote management host
//! - [`NodeSnapshot`] / [`ContainerSnapshot`]: per-item captures
//! - [`HostSnapshot`]: everything seen on one host in one cycle
//! - [`FleetSummary`]: the fleet-wide result of a cycle

pub mod host;
pub mod ids;
pub mod snapshot;
pub mod summary;

pub use host::RemoteHost;
pub use ids::{HostId, SubscriptionId};
pub use snapshot::{ContainerSnapshot, ContainerStatus, HostSnapshot, NodeSnapshot, NodeStatus};
pub use summary::{FleetSummary, FleetTotals};
