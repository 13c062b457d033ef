//! Shared fakes for aggregator integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetscope_aggregator::{
    ContainerDetail, ContainerEntry, NodeDetail, NodeEntry, PersistError, Persister,
    RegistryError, RemoteClient, RemoteClientFactory, RemoteHostRegistry, RemoteResult,
    StaticHostRegistry,
};
use fleetscope_resilience::{CircuitBreakerConfig, RemoteError, ResilientInvoker, RetryPolicy};
use fleetscope_types::{FleetSummary, HostId, RemoteHost};
use parking_lot::Mutex;

/// Behaviour of one fake remote host.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub nodes: Vec<String>,
    pub containers: Vec<ContainerEntry>,
    pub list_nodes_error: Option<RemoteError>,
    pub broken_node_details: HashSet<String>,
    pub list_delay: Option<Duration>,
    pub panic_on_list: bool,
    /// Delay and node names for the first `list_nodes` call only.
    pub first_call: Option<(Duration, Vec<String>)>,
    pub node_memory_total: Option<u64>,
}

impl FakeHost {
    pub fn with_nodes(nodes: &[&str]) -> Self {
        Self {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn containers(mut self, node: &str, first_vmid: u32, count: u32, running: u32) -> Self {
        for i in 0..count {
            self.containers.push(ContainerEntry {
                vmid: first_vmid + i,
                name: format!("ct{}", first_vmid + i),
                node: node.to_string(),
                status: if i < running { "running" } else { "stopped" }.to_string(),
            });
        }
        self
    }

    pub fn failing(mut self, error: RemoteError) -> Self {
        self.list_nodes_error = Some(error);
        self
    }

    pub fn broken_detail(mut self, node: &str) -> Self {
        self.broken_node_details.insert(node.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_list = true;
        self
    }

    pub fn slow_first_call(mut self, delay: Duration, nodes: &[&str]) -> Self {
        self.first_call = Some((delay, nodes.iter().map(|n| n.to_string()).collect()));
        self
    }

    pub fn memory_total(mut self, bytes: u64) -> Self {
        self.node_memory_total = Some(bytes);
        self
    }
}

pub struct FakeClient {
    behaviour: FakeHost,
    pub list_nodes_calls: AtomicU32,
}

impl FakeClient {
    pub fn calls(&self) -> u32 {
        self.list_nodes_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClient for FakeClient {
    async fn list_nodes(&self) -> RemoteResult<Vec<NodeEntry>> {
        let call = self.list_nodes_calls.fetch_add(1, Ordering::SeqCst);

        if let (0, Some((delay, nodes))) = (call, &self.behaviour.first_call) {
            tokio::time::sleep(*delay).await;
            return Ok(nodes
                .iter()
                .map(|name| NodeEntry {
                    name: name.clone(),
                    status: "online".to_string(),
                })
                .collect());
        }

        if let Some(delay) = self.behaviour.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.behaviour.panic_on_list {
            panic!("fake client panic");
        }
        if let Some(error) = &self.behaviour.list_nodes_error {
            return Err(error.clone());
        }

        Ok(self
            .behaviour
            .nodes
            .iter()
            .map(|name| NodeEntry {
                name: name.clone(),
                status: "online".to_string(),
            })
            .collect())
    }

    async fn node_detail(&self, node: &str) -> RemoteResult<NodeDetail> {
        if self.behaviour.broken_node_details.contains(node) {
            return Err(RemoteError::timeout(format!("{node} status timed out")));
        }
        Ok(NodeDetail {
            cpu_percent: Some(20.0),
            memory_total: Some(self.behaviour.node_memory_total.unwrap_or(1_000)),
            memory_used: Some(400),
            disk_total: Some(10_000),
            disk_used: Some(2_500),
            uptime_secs: Some(3_600),
        })
    }

    async fn list_containers(&self) -> RemoteResult<Vec<ContainerEntry>> {
        Ok(self.behaviour.containers.clone())
    }

    async fn container_detail(&self, _node: &str, _vmid: u32) -> RemoteResult<ContainerDetail> {
        Ok(ContainerDetail {
            status: None,
            memory_allocated: Some(512),
            memory_used: Some(128),
            disk_size: Some(8_000),
            disk_used: Some(1_000),
            cpu_percent: Some(1.5),
            uptime_secs: Some(60),
        })
    }
}

/// A set of fake hosts that doubles as client factory.
#[derive(Default)]
pub struct FakeFleet {
    hosts: Vec<(RemoteHost, Arc<FakeClient>)>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, id: &str, behaviour: FakeHost) -> Self {
        let host = RemoteHost::new(id, id.to_uppercase(), format!("https://{id}:8006"));
        let client = Arc::new(FakeClient {
            behaviour,
            list_nodes_calls: AtomicU32::new(0),
        });
        self.hosts.push((host, client));
        self
    }

    pub fn client(&self, id: &str) -> Arc<FakeClient> {
        self.hosts
            .iter()
            .find(|(host, _)| host.id.as_str() == id)
            .map(|(_, client)| client.clone())
            .expect("unknown fake host")
    }

    pub fn registry(&self) -> Arc<StaticHostRegistry> {
        Arc::new(StaticHostRegistry::new(
            self.hosts.iter().map(|(host, _)| host.clone()).collect(),
        ))
    }
}

impl RemoteClientFactory for FakeFleet {
    fn client_for(&self, host: &RemoteHost) -> RemoteResult<Arc<dyn RemoteClient>> {
        self.hosts
            .iter()
            .find(|(known, _)| known.id == host.id)
            .map(|(_, client)| client.clone() as Arc<dyn RemoteClient>)
            .ok_or_else(|| RemoteError::validation(format!("no client for {}", host.id)))
    }
}

/// Invoker with short retry delays and a high breaker threshold.
pub fn test_invoker() -> Arc<ResilientInvoker> {
    Arc::new(ResilientInvoker::with_policies(
        CircuitBreakerConfig {
            failure_threshold: 50,
            recovery_threshold: 1,
            open_timeout: Duration::from_secs(60),
        },
        RetryPolicy::new(3, Duration::from_millis(10), 2.0),
    ))
}

pub fn host_id(id: &str) -> HostId {
    HostId::new(id)
}

/// Persister that records what it was given.
#[derive(Default)]
pub struct RecordingPersister {
    pub fail: bool,
    pub saved: Mutex<Vec<FleetSummary>>,
    pub attempts: AtomicUsize,
}

impl RecordingPersister {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Persister for RecordingPersister {
    async fn save(&self, summary: &FleetSummary) -> Result<(), PersistError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersistError::Backend("disk full".to_string()));
        }
        self.saved.lock().push(summary.clone());
        Ok(())
    }
}

/// Registry that fails its first `failures` calls.
pub struct FlakyRegistry {
    pub inner: Arc<StaticHostRegistry>,
    pub failures: AtomicU32,
}

#[async_trait]
impl RemoteHostRegistry for FlakyRegistry {
    async fn list_enabled(&self) -> Result<Vec<RemoteHost>, RegistryError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RegistryError("configuration store unavailable".to_string()));
        }
        self.inner.list_enabled().await
    }
}
