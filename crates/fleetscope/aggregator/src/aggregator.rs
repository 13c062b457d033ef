//! Background poller that assembles fleet summaries.
//!
//! One worker task drives the poll loop. Each cycle fans out one task per
//! enabled host, routes every remote call through the shared
//! [`ResilientInvoker`], folds the per-host snapshots into a
//! [`FleetSummary`], stores it in the cache, notifies subscribers and hands
//! it to the persister.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fleetscope_resilience::ResilientInvoker;
use fleetscope_types::{
    ContainerSnapshot, ContainerStatus, FleetSummary, HostSnapshot, NodeSnapshot, NodeStatus,
    RemoteHost, SubscriptionId,
};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{SnapshotCache, SnapshotView};
use crate::client::{ContainerEntry, NodeEntry, RemoteClient, RemoteClientFactory};
use crate::config::AggregatorConfig;
use crate::error::{panic_message, AggregationCycleError, CycleResult, HostPollError, SubscriberError};
use crate::persist::Persister;
use crate::registry::{enabled_unique, RemoteHostRegistry};
use crate::subscribers::SubscriberRegistry;

/// Lifecycle state of the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Stopped,
    Running,
}

impl std::fmt::Display for AggregatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregatorState::Stopped => write!(f, "stopped"),
            AggregatorState::Running => write!(f, "running"),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// State shared between the handle and the worker task.
struct Shared {
    config: AggregatorConfig,
    registry: Arc<dyn RemoteHostRegistry>,
    clients: Arc<dyn RemoteClientFactory>,
    invoker: Arc<ResilientInvoker>,
    persister: Option<Arc<dyn Persister>>,
    cache: SnapshotCache,
    subscribers: SubscriberRegistry,
    refresh: Notify,
    cycles: AtomicU64,
}

/// Fleet telemetry aggregator.
///
/// Created in the composition root and shared by reference; nothing runs
/// until [`start`](Self::start) is called.
pub struct Aggregator {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    /// Worker that was told to stop but had not finished within
    /// `join_timeout`. The next worker waits for it before its first cycle.
    draining: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for [`Aggregator`].
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    registry: Arc<dyn RemoteHostRegistry>,
    clients: Arc<dyn RemoteClientFactory>,
    invoker: Option<Arc<ResilientInvoker>>,
    persister: Option<Arc<dyn Persister>>,
}

impl AggregatorBuilder {
    pub fn config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an invoker with other components. A default one is created
    /// otherwise.
    pub fn invoker(mut self, invoker: Arc<ResilientInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn build(self) -> Aggregator {
        Aggregator {
            shared: Arc::new(Shared {
                config: self.config,
                registry: self.registry,
                clients: self.clients,
                invoker: self
                    .invoker
                    .unwrap_or_else(|| Arc::new(ResilientInvoker::default())),
                persister: self.persister,
                cache: SnapshotCache::new(),
                subscribers: SubscriberRegistry::new(),
                refresh: Notify::new(),
                cycles: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
            draining: Mutex::new(None),
        }
    }
}

impl Aggregator {
    pub fn builder(
        registry: Arc<dyn RemoteHostRegistry>,
        clients: Arc<dyn RemoteClientFactory>,
    ) -> AggregatorBuilder {
        AggregatorBuilder {
            config: AggregatorConfig::default(),
            registry,
            clients,
            invoker: None,
            persister: None,
        }
    }

    /// Start the background worker. Does nothing if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();

        if let Some(existing) = worker.as_ref() {
            if !existing.handle.is_finished() {
                debug!("Aggregator already running");
                return;
            }
        }

        let previous = self
            .draining
            .lock()
            .take()
            .filter(|handle| !handle.is_finished());
        if previous.is_some() {
            info!("Previous worker still finishing its cycle; new worker will wait for it");
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_worker(self.shared.clone(), shutdown_rx, previous));
        *worker = Some(Worker { handle, shutdown });

        info!(
            poll_interval_ms = self.shared.config.poll_interval.as_millis() as u64,
            "Aggregator started"
        );
    }

    /// Stop the background worker.
    ///
    /// An in-flight cycle is allowed to finish; no new cycle starts. Waits
    /// at most `join_timeout` and logs if the worker has not finished by then.
    /// A worker still busy at that point is kept so that a later
    /// [`start`](Self::start) never overlaps with it.
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        let Some(mut worker) = worker else {
            debug!("Aggregator already stopped");
            return;
        };

        info!("Stopping aggregator");
        let _ = worker.shutdown.send(true);

        let join_timeout = self.shared.config.join_timeout;
        match tokio::time::timeout(join_timeout, &mut worker.handle).await {
            Ok(Ok(())) => info!("Aggregator stopped"),
            Ok(Err(e)) => error!(error = %e, "Aggregator worker terminated abnormally"),
            Err(_) => {
                warn!(
                    join_timeout_ms = join_timeout.as_millis() as u64,
                    "Aggregator worker still busy after join timeout, detaching"
                );
                *self.draining.lock() = Some(worker.handle);
            }
        }
    }

    pub fn state(&self) -> AggregatorState {
        match self.worker.lock().as_ref() {
            Some(worker) if !worker.handle.is_finished() => AggregatorState::Running,
            _ => AggregatorState::Stopped,
        }
    }

    /// Ask a running worker to start its next cycle now.
    pub fn refresh(&self) {
        self.shared.refresh.notify_one();
    }

    /// Run one cycle on the calling task.
    pub async fn poll_once(&self) -> CycleResult<Arc<FleetSummary>> {
        self.shared.run_cycle().await
    }

    /// Latest fleet summary with staleness, or `NoData` before the first
    /// completed cycle.
    pub fn snapshot(&self) -> SnapshotView {
        self.shared.cache.view()
    }

    pub fn latest(&self) -> Option<Arc<FleetSummary>> {
        self.shared.cache.get()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&FleetSummary) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.shared.subscribers.add(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.remove(id)
    }

    pub fn invoker(&self) -> &Arc<ResilientInvoker> {
        &self.shared.invoker
    }

    /// Number of cycles completed since construction.
    pub fn cycles_completed(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.shutdown.send(true);
        }
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
    previous: Option<JoinHandle<()>>,
) {
    // Only one poll loop may touch the cache at a time.
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            error!(error = %e, "Previous aggregator worker terminated abnormally");
        }
    }

    debug!("Aggregator worker running");

    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }

        match AssertUnwindSafe(shared.run_cycle()).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "Poll cycle failed"),
            Err(payload) => {
                let e = AggregationCycleError::Panicked(panic_message(payload.as_ref()));
                error!(error = %e, "Poll cycle failed");
            }
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(shared.config.poll_interval) => {}
            _ = shared.refresh.notified() => {
                debug!("Immediate refresh requested");
            }
        }
    }

    debug!("Aggregator worker exiting");
}

impl Shared {
    #[instrument(skip(self), fields(cycle = self.cycles.load(Ordering::SeqCst) + 1))]
    async fn run_cycle(self: &Arc<Self>) -> CycleResult<Arc<FleetSummary>> {
        let hosts = enabled_unique(self.registry.list_enabled().await?);
        debug!(hosts = hosts.len(), "Poll cycle starting");

        let tasks: Vec<_> = hosts
            .into_iter()
            .map(|host| {
                let shared = self.clone();
                let host_id = host.id.clone();
                (host_id, tokio::spawn(async move { shared.poll_host(host).await }))
            })
            .collect();

        let mut snapshots = Vec::with_capacity(tasks.len());
        for (host_id, task) in tasks {
            match task.await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(host_id = %host_id, error = %e, "Host poll task failed");
                    snapshots.push(HostSnapshot::failed(host_id, format!("host poll aborted: {e}")));
                }
            }
        }

        let summary = self.cache.replace(FleetSummary::from_hosts(snapshots));
        self.cycles.fetch_add(1, Ordering::SeqCst);

        let totals = &summary.totals;
        info!(
            hosts = totals.hosts_total,
            failed = totals.hosts_failed,
            nodes = totals.nodes_total,
            containers = totals.containers_total,
            "Poll cycle complete"
        );

        let report = self.subscribers.notify(&summary);
        if report.failed > 0 {
            debug!(delivered = report.delivered, failed = report.failed, "Subscribers notified");
        }

        if let Some(persister) = &self.persister {
            if let Err(e) = persister.save(&summary).await {
                warn!(error = %e, "Failed to persist fleet summary");
            }
        }

        Ok(summary)
    }

    async fn poll_host(&self, host: RemoteHost) -> HostSnapshot {
        match self.collect_host(&host).await {
            Ok((nodes, containers)) => HostSnapshot::success(host.id, nodes, containers),
            Err(e) => {
                warn!(host_id = %host.id, error = %e, "Host poll failed");
                HostSnapshot::failed(host.id, e.to_string())
            }
        }
    }

    #[instrument(skip(self, host), fields(host_id = %host.id))]
    async fn collect_host(
        &self,
        host: &RemoteHost,
    ) -> Result<(Vec<NodeSnapshot>, Vec<ContainerSnapshot>), HostPollError> {
        let client = self.clients.client_for(host).map_err(HostPollError::Client)?;
        let client: &dyn RemoteClient = client.as_ref();
        let resource = host.id.resource_name();

        let node_entries = self.invoker.invoke(&resource, || client.list_nodes()).await?;
        let nodes = join_all(
            node_entries
                .into_iter()
                .map(|entry| self.node_snapshot(client, &resource, entry)),
        )
        .await;

        let container_entries = self
            .invoker
            .invoke(&resource, || client.list_containers())
            .await?;
        let containers = join_all(
            container_entries
                .into_iter()
                .map(|entry| self.container_snapshot(client, &resource, entry)),
        )
        .await;

        debug!(nodes = nodes.len(), containers = containers.len(), "Host polled");
        Ok((nodes, containers))
    }

    /// Build a node snapshot; detail failures leave its metrics unknown.
    async fn node_snapshot(
        &self,
        client: &dyn RemoteClient,
        host_resource: &str,
        entry: NodeEntry,
    ) -> NodeSnapshot {
        let mut node = NodeSnapshot::listed(entry.name.clone(), NodeStatus::parse(&entry.status));

        // Offline nodes cannot answer detail requests.
        if node.status == NodeStatus::Offline {
            return node;
        }

        let resource = format!("{host_resource}/node:{}", entry.name);
        match self
            .invoker
            .invoke(&resource, || client.node_detail(&entry.name))
            .await
        {
            Ok(detail) => detail.apply_to(&mut node),
            Err(e) => debug!(node = %entry.name, error = %e, "Node detail unavailable"),
        }
        node
    }

    async fn container_snapshot(
        &self,
        client: &dyn RemoteClient,
        host_resource: &str,
        entry: ContainerEntry,
    ) -> ContainerSnapshot {
        let mut container = ContainerSnapshot::listed(
            entry.vmid,
            entry.name.clone(),
            entry.node.clone(),
            ContainerStatus::parse(&entry.status),
        );

        let resource = format!("{host_resource}/ct:{}", entry.vmid);
        match self
            .invoker
            .invoke(&resource, || client.container_detail(&entry.node, entry.vmid))
            .await
        {
            Ok(detail) => detail.apply_to(&mut container),
            Err(e) => debug!(vmid = entry.vmid, error = %e, "Container detail unavailable"),
        }
        container
    }
}
