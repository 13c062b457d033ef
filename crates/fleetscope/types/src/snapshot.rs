//! Point-in-time captures of remote node and container state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::HostId;

/// Reported status of a hypervisor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
    Unknown,
}

impl NodeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "online" => NodeStatus::Online,
            "offline" => NodeStatus::Offline,
            _ => NodeStatus::Unknown,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Online => write!(f, "online"),
            NodeStatus::Offline => write!(f, "offline"),
            NodeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reported status of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Paused,
    Unknown,
}

impl ContainerStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "running" => ContainerStatus::Running,
            "stopped" => ContainerStatus::Stopped,
            "paused" => ContainerStatus::Paused,
            _ => ContainerStatus::Unknown,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Stopped => write!(f, "stopped"),
            ContainerStatus::Paused => write!(f, "paused"),
            ContainerStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// State of one hypervisor node.
///
/// Detail fields are `None` when the detail fetch for the node failed;
/// the node itself is still reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub status: NodeStatus,
    pub cpu_percent: Option<f64>,
    pub memory_total: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_total: Option<u64>,
    pub disk_used: Option<u64>,
    pub uptime_secs: Option<u64>,
}

impl NodeSnapshot {
    /// A node known only by its listing entry.
    pub fn listed(name: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            name: name.into(),
            status,
            cpu_percent: None,
            memory_total: None,
            memory_used: None,
            disk_total: None,
            disk_used: None,
            uptime_secs: None,
        }
    }

    /// Whether any detail metric was captured for this node.
    pub fn has_data(&self) -> bool {
        self.cpu_percent.is_some()
            || self.memory_total.is_some()
            || self.disk_total.is_some()
            || self.uptime_secs.is_some()
    }
}

/// State of one container (LXC guest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub vmid: u32,
    pub name: String,
    /// Node the container is placed on.
    pub node: String,
    pub status: ContainerStatus,
    pub memory_allocated: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_size: Option<u64>,
    pub disk_used: Option<u64>,
    pub cpu_percent: Option<f64>,
    pub uptime_secs: Option<u64>,
}

impl ContainerSnapshot {
    pub fn listed(
        vmid: u32,
        name: impl Into<String>,
        node: impl Into<String>,
        status: ContainerStatus,
    ) -> Self {
        Self {
            vmid,
            name: name.into(),
            node: node.into(),
            status,
            memory_allocated: None,
            memory_used: None,
            disk_size: None,
            disk_used: None,
            cpu_percent: None,
            uptime_secs: None,
        }
    }
}

/// Everything observed on one remote host during one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub host_id: HostId,
    pub nodes: Vec<NodeSnapshot>,
    pub containers: Vec<ContainerSnapshot>,
    pub captured_at: DateTime<Utc>,
    /// Set when the host could not be polled; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostSnapshot {
    pub fn success(
        host_id: HostId,
        nodes: Vec<NodeSnapshot>,
        containers: Vec<ContainerSnapshot>,
    ) -> Self {
        Self {
            host_id,
            nodes,
            containers,
            captured_at: Utc::now(),
            error: None,
        }
    }

    /// Snapshot of a host whose processing failed. Carries no items.
    pub fn failed(host_id: HostId, error: impl Into<String>) -> Self {
        Self {
            host_id,
            nodes: Vec::new(),
            containers: Vec::new(),
            captured_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(NodeStatus::parse("ONLINE"), NodeStatus::Online);
        assert_eq!(NodeStatus::parse("weird"), NodeStatus::Unknown);
        assert_eq!(ContainerStatus::parse("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::parse(""), ContainerStatus::Unknown);
    }

    #[test]
    fn test_listed_node_has_no_data() {
        let node = NodeSnapshot::listed("pve1", NodeStatus::Online);
        assert!(!node.has_data());
    }

    #[test]
    fn test_failed_host_snapshot_is_empty() {
        let snap = HostSnapshot::failed(HostId::new("b"), "connection refused");
        assert!(snap.is_error());
        assert!(snap.nodes.is_empty());
        assert!(snap.containers.is_empty());
    }
}
