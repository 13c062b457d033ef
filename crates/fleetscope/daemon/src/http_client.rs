//! HTTP client for Proxmox-style management APIs.
//!
//! Every response is wrapped in a `{"data": ...}` envelope. Transport and
//! status failures are mapped onto [`ErrorKind`] here so the resilience
//! layer can decide what to retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fleetscope_aggregator::{
    ContainerDetail, ContainerEntry, NodeDetail, NodeEntry, RemoteClient, RemoteClientFactory,
    RemoteResult,
};
use fleetscope_resilience::{ErrorKind, RemoteError};
use fleetscope_types::{HostId, RemoteHost};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct NodeListItem {
    node: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryInfo {
    total: Option<u64>,
    used: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NodeStatusPayload {
    /// Fraction of total CPU, 0.0 to 1.0.
    #[serde(default)]
    cpu: Option<f64>,
    #[serde(default)]
    memory: Option<MemoryInfo>,
    #[serde(default)]
    rootfs: Option<MemoryInfo>,
    #[serde(default)]
    uptime: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClusterResource {
    #[serde(rename = "type")]
    kind: String,
    vmid: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    node: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cpu: Option<f64>,
    #[serde(default)]
    maxmem: Option<u64>,
    #[serde(default)]
    mem: Option<u64>,
    #[serde(default)]
    maxdisk: Option<u64>,
    #[serde(default)]
    disk: Option<u64>,
    #[serde(default)]
    uptime: Option<u64>,
}

fn fraction_to_percent(cpu: Option<f64>) -> Option<f64> {
    cpu.filter(|c| c.is_finite()).map(|c| c * 100.0)
}

impl From<NodeListItem> for NodeEntry {
    fn from(item: NodeListItem) -> Self {
        NodeEntry {
            name: item.node,
            status: item.status.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

impl From<NodeStatusPayload> for NodeDetail {
    fn from(payload: NodeStatusPayload) -> Self {
        let memory = payload.memory.unwrap_or_default();
        let rootfs = payload.rootfs.unwrap_or_default();
        NodeDetail {
            cpu_percent: fraction_to_percent(payload.cpu),
            memory_total: memory.total,
            memory_used: memory.used,
            disk_total: rootfs.total,
            disk_used: rootfs.used,
            uptime_secs: payload.uptime,
        }
    }
}

impl From<ContainerStatusPayload> for ContainerDetail {
    fn from(payload: ContainerStatusPayload) -> Self {
        ContainerDetail {
            status: payload.status,
            memory_allocated: payload.maxmem,
            memory_used: payload.mem,
            disk_size: payload.maxdisk,
            disk_used: payload.disk,
            cpu_percent: fraction_to_percent(payload.cpu),
            uptime_secs: payload.uptime,
        }
    }
}

/// Keep LXC containers that carry the fields a listing needs.
fn containers_from_resources(resources: Vec<ClusterResource>) -> Vec<ContainerEntry> {
    resources
        .into_iter()
        .filter(|r| r.kind == "lxc")
        .filter_map(|r| {
            let vmid = r.vmid?;
            let node = r.node?;
            Some(ContainerEntry {
                vmid,
                name: r.name.unwrap_or_else(|| format!("ct{vmid}")),
                node,
                status: r.status.unwrap_or_else(|| "unknown".to_string()),
            })
        })
        .collect()
}

/// Map an HTTP status onto an error kind.
pub fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authentication,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::Unavailable,
        s if s.is_server_error() => ErrorKind::Unavailable,
        _ => ErrorKind::Validation,
    }
}

/// Map a transport error onto an error kind.
pub fn classify_transport(error: &reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        ErrorKind::Timeout
    } else if error.is_decode() || error.is_builder() {
        ErrorKind::Validation
    } else if let Some(status) = error.status() {
        classify_status(status)
    } else {
        ErrorKind::Network
    }
}

fn transport_error(path: &str, error: reqwest::Error) -> RemoteError {
    RemoteError::new(classify_transport(&error), format!("GET {path}: {error}"))
}

/// Client for one Proxmox-style host.
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemoteClient {
    /// Build a client. `token` is the full API token, `USER@REALM!ID=SECRET`.
    pub fn new(host: &RemoteHost, token: Option<String>, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!host.verify_tls)
            .build()
            .map_err(|e| RemoteError::validation(format!("invalid client settings: {e}")))?;

        Ok(Self {
            http,
            base_url: format!("{}/api2/json", host.address.trim_end_matches('/')),
            token,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("PVEAPIToken={token}"));
        }

        let response = request.send().await.map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::new(
                classify_status(status),
                format!("GET {path} returned {status}"),
            ));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| transport_error(path, e))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list_nodes(&self) -> RemoteResult<Vec<NodeEntry>> {
        let nodes: Vec<NodeListItem> = self.get("/nodes").await?;
        Ok(nodes.into_iter().map(NodeEntry::from).collect())
    }

    async fn node_detail(&self, node: &str) -> RemoteResult<NodeDetail> {
        let payload: NodeStatusPayload = self.get(&format!("/nodes/{node}/status")).await?;
        Ok(payload.into())
    }

    async fn list_containers(&self) -> RemoteResult<Vec<ContainerEntry>> {
        let resources: Vec<ClusterResource> = self.get("/cluster/resources?type=vm").await?;
        Ok(containers_from_resources(resources))
    }

    async fn container_detail(&self, node: &str, vmid: u32) -> RemoteResult<ContainerDetail> {
        let payload: ContainerStatusPayload = self
            .get(&format!("/nodes/{node}/lxc/{vmid}/status/current"))
            .await?;
        Ok(payload.into())
    }
}

/// Resolves a host's `credential_ref` to the API token.
pub type CredentialLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Builds and caches one [`HttpRemoteClient`] per host.
///
/// A cached client is reused while the host record is unchanged.
pub struct HttpClientFactory {
    timeout: Duration,
    credentials: Box<CredentialLookup>,
    clients: DashMap<HostId, (RemoteHost, Arc<HttpRemoteClient>)>,
}

impl HttpClientFactory {
    /// Factory that reads credentials from environment variables named by
    /// each host's `credential_ref`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_credentials(timeout, |name| std::env::var(name).ok())
    }

    pub fn with_credentials<F>(timeout: Duration, credentials: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            timeout,
            credentials: Box::new(credentials),
            clients: DashMap::new(),
        }
    }

    fn resolve_token(&self, host: &RemoteHost) -> RemoteResult<Option<String>> {
        match &host.credential_ref {
            None => Ok(None),
            Some(name) => (self.credentials)(name).map(Some).ok_or_else(|| {
                RemoteError::authentication(format!("credential '{name}' is not available"))
            }),
        }
    }
}

impl RemoteClientFactory for HttpClientFactory {
    fn client_for(&self, host: &RemoteHost) -> RemoteResult<Arc<dyn RemoteClient>> {
        if let Some(entry) = self.clients.get(&host.id) {
            let (cached_host, client) = entry.value();
            if cached_host == host {
                return Ok(client.clone() as Arc<dyn RemoteClient>);
            }
        }

        let token = self.resolve_token(host)?;
        let client = Arc::new(HttpRemoteClient::new(host, token, self.timeout)?);
        self.clients
            .insert(host.id.clone(), (host.clone(), client.clone()));
        debug!(host_id = %host.id, "HTTP client created");

        Ok(client)
    }
}
