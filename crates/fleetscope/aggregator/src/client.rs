//! Capability set of a remote management host.
//!
//! The aggregator depends only on [`RemoteClient`]; the wire protocol lives
//! behind it, and transport errors are classified into
//! [`RemoteError`](fleetscope_resilience::RemoteError) kinds there.

use std::sync::Arc;

use async_trait::async_trait;
use fleetscope_resilience::RemoteError;
use fleetscope_types::{ContainerSnapshot, ContainerStatus, NodeSnapshot, RemoteHost};
use serde::{Deserialize, Serialize};

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Node as returned by the node listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub status: String,
}

/// Metrics of one node. Fields the remote did not report are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDetail {
    pub cpu_percent: Option<f64>,
    pub memory_total: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_total: Option<u64>,
    pub disk_used: Option<u64>,
    pub uptime_secs: Option<u64>,
}

impl NodeDetail {
    pub fn apply_to(self, node: &mut NodeSnapshot) {
        node.cpu_percent = self.cpu_percent;
        node.memory_total = self.memory_total;
        node.memory_used = self.memory_used;
        node.disk_total = self.disk_total;
        node.disk_used = self.disk_used;
        node.uptime_secs = self.uptime_secs;
    }
}

/// Container as returned by the container listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub vmid: u32,
    pub name: String,
    pub node: String,
    pub status: String,
}

/// Metrics of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetail {
    /// Fresher status than the listing, when reported.
    pub status: Option<String>,
    pub memory_allocated: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_size: Option<u64>,
    pub disk_used: Option<u64>,
    pub cpu_percent: Option<f64>,
    pub uptime_secs: Option<u64>,
}

impl ContainerDetail {
    pub fn apply_to(self, container: &mut ContainerSnapshot) {
        if let Some(status) = self.status.as_deref() {
            container.status = ContainerStatus::parse(status);
        }
        container.memory_allocated = self.memory_allocated;
        container.memory_used = self.memory_used;
        container.disk_size = self.disk_size;
        container.disk_used = self.disk_used;
        container.cpu_percent = self.cpu_percent;
        container.uptime_secs = self.uptime_secs;
    }
}

/// Client for one remote management host.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// List the host's nodes.
    async fn list_nodes(&self) -> RemoteResult<Vec<NodeEntry>>;

    /// Fetch metrics for a node.
    async fn node_detail(&self, node: &str) -> RemoteResult<NodeDetail>;

    /// List containers across all of the host's nodes.
    async fn list_containers(&self) -> RemoteResult<Vec<ContainerEntry>>;

    /// Fetch metrics for a container.
    async fn container_detail(&self, node: &str, vmid: u32) -> RemoteResult<ContainerDetail>;
}

/// Builds a [`RemoteClient`] for a host.
pub trait RemoteClientFactory: Send + Sync {
    fn client_for(&self, host: &RemoteHost) -> RemoteResult<Arc<dyn RemoteClient>>;
}

impl<F> RemoteClientFactory for F
where
    F: Fn(&RemoteHost) -> RemoteResult<Arc<dyn RemoteClient>> + Send + Sync,
{
    fn client_for(&self, host: &RemoteHost) -> RemoteResult<Arc<dyn RemoteClient>> {
        self(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscope_types::NodeStatus;

    #[test]
    fn test_node_detail_apply() {
        let mut node = NodeSnapshot::listed("pve1", NodeStatus::Online);
        NodeDetail {
            cpu_percent: Some(12.5),
            memory_total: Some(1024),
            ..Default::default()
        }
        .apply_to(&mut node);

        assert_eq!(node.cpu_percent, Some(12.5));
        assert_eq!(node.memory_total, Some(1024));
        assert_eq!(node.disk_total, None);
        assert!(node.has_data());
    }

    #[test]
    fn test_container_detail_overrides_status() {
        let mut ct = ContainerSnapshot::listed(100, "web", "pve1", ContainerStatus::Stopped);
        ContainerDetail {
            status: Some("running".to_string()),
            ..Default::default()
        }
        .apply_to(&mut ct);
        assert_eq!(ct.status, ContainerStatus::Running);
    }
}
