//! Fleet-wide summaries derived from one poll cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::HostId;
use crate::snapshot::{ContainerStatus, HostSnapshot, NodeStatus};

/// Totals derived from the host snapshots of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetTotals {
    /// Number of hosts polled.
    pub hosts_total: usize,

    /// Number of hosts that reported an error.
    pub hosts_failed: usize,

    pub nodes_total: usize,
    pub nodes_online: usize,
    pub containers_total: usize,
    pub containers_running: usize,

    /// Summed over nodes with data.
    pub memory_total: u64,
    pub memory_used: u64,
    pub disk_total: u64,
    pub disk_used: u64,

    /// Mean CPU usage over nodes that reported one, 0.0 when none did.
    pub average_cpu_percent: f64,
}

impl FleetTotals {
    /// Compute totals from host snapshots.
    ///
    /// Hosts with an error contribute zero to every count.
    pub fn from_hosts(hosts: &[HostSnapshot]) -> Self {
        let mut totals = FleetTotals {
            hosts_total: hosts.len(),
            ..Default::default()
        };

        let mut cpu_sum = 0.0;
        let mut cpu_samples = 0usize;

        for host in hosts {
            if host.is_error() {
                totals.hosts_failed += 1;
                continue;
            }

            for node in &host.nodes {
                totals.nodes_total += 1;
                if node.status == NodeStatus::Online {
                    totals.nodes_online += 1;
                }

                // Remote-reported values; saturate rather than overflow.
                totals.memory_total = totals
                    .memory_total
                    .saturating_add(node.memory_total.unwrap_or(0));
                totals.memory_used = totals
                    .memory_used
                    .saturating_add(node.memory_used.unwrap_or(0));
                totals.disk_total = totals.disk_total.saturating_add(node.disk_total.unwrap_or(0));
                totals.disk_used = totals.disk_used.saturating_add(node.disk_used.unwrap_or(0));

                if let Some(cpu) = node.cpu_percent {
                    cpu_sum += cpu;
                    cpu_samples += 1;
                }
            }

            totals.containers_total += host.containers.len();
            totals.containers_running += host
                .containers
                .iter()
                .filter(|c| c.status == ContainerStatus::Running)
                .count();
        }

        if cpu_samples > 0 {
            totals.average_cpu_percent = cpu_sum / cpu_samples as f64;
        }

        totals
    }
}

/// Fleet-wide view produced by one completed poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    /// One entry per enabled host, in registry order.
    pub hosts: Vec<HostSnapshot>,
    pub totals: FleetTotals,
    pub generated_at: DateTime<Utc>,
}

impl FleetSummary {
    pub fn from_hosts(hosts: Vec<HostSnapshot>) -> Self {
        let totals = FleetTotals::from_hosts(&hosts);
        Self {
            hosts,
            totals,
            generated_at: Utc::now(),
        }
    }

    pub fn host(&self, id: &HostId) -> Option<&HostSnapshot> {
        self.hosts.iter().find(|h| &h.host_id == id)
    }

    /// Whether any host failed during the cycle.
    pub fn is_partial(&self) -> bool {
        self.totals.hosts_failed > 0
    }
}
