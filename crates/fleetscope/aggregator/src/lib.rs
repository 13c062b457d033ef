//! # fleetscope-aggregator
//!
//! Resilient fleet telemetry aggregation.
//!
//! A single background worker periodically polls every enabled remote
//! management host for node and container state. Each host is processed in
//! isolation: an unreachable or misbehaving host shows up as an error on its
//! own [`HostSnapshot`](fleetscope_types::HostSnapshot) and never stalls or
//! aborts the cycle. Every remote call goes through a
//! [`ResilientInvoker`](fleetscope_resilience::ResilientInvoker).
//!
//! ## Key Components
//!
//! - [`Aggregator`]: poll loop and public read/subscribe surface
//! - [`SnapshotCache`]: last completed [`FleetSummary`](fleetscope_types::FleetSummary)
//! - [`SubscriberRegistry`]: fan-out of new summaries
//! - [`RemoteClient`], [`RemoteHostRegistry`], [`Persister`]: collaborators
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fleetscope_aggregator::{
//!     Aggregator, RemoteClient, RemoteResult, SnapshotView, StaticHostRegistry,
//! };
//! use fleetscope_types::RemoteHost;
//!
//! # async fn example(make_client: impl Fn(&RemoteHost) -> RemoteResult<Arc<dyn RemoteClient>> + Send + Sync + 'static) {
//! let registry = Arc::new(StaticHostRegistry::new(vec![
//!     RemoteHost::new("pve1", "Rack 1", "https://pve1:8006"),
//! ]));
//! let aggregator = Aggregator::builder(registry, Arc::new(make_client)).build();
//!
//! aggregator.subscribe(|summary| {
//!     println!("{} containers", summary.totals.containers_total);
//!     Ok(())
//! });
//! aggregator.start();
//!
//! if let SnapshotView::Available { staleness, .. } = aggregator.snapshot() {
//!     println!("data is {:?} old", staleness);
//! }
//!
//! aggregator.stop().await;
//! # }
//! ```

pub mod aggregator;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod persist;
pub mod registry;
pub mod subscribers;

pub use aggregator::{Aggregator, AggregatorBuilder, AggregatorState};
pub use cache::{SnapshotCache, SnapshotView};
pub use client::{
    ContainerDetail, ContainerEntry, NodeDetail, NodeEntry, RemoteClient, RemoteClientFactory,
    RemoteResult,
};
pub use config::AggregatorConfig;
pub use error::{
    AggregationCycleError, CycleResult, HostPollError, PersistError, RegistryError,
    SubscriberError,
};
pub use persist::Persister;
pub use registry::{RemoteHostRegistry, StaticHostRegistry};
pub use subscribers::{NotifyReport, SubscriberRegistry};
