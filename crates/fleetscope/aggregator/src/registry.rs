//! Source of the hosts to poll.

use std::collections::HashSet;

use async_trait::async_trait;
use fleetscope_types::RemoteHost;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::RegistryError;

/// Configuration collaborator that knows which hosts are enabled.
#[async_trait]
pub trait RemoteHostRegistry: Send + Sync {
    /// Enabled hosts, in a stable order, without duplicate ids.
    async fn list_enabled(&self) -> Result<Vec<RemoteHost>, RegistryError>;
}

/// Registry backed by an in-memory host list.
#[derive(Debug, Default)]
pub struct StaticHostRegistry {
    hosts: RwLock<Vec<RemoteHost>>,
}

impl StaticHostRegistry {
    pub fn new(hosts: Vec<RemoteHost>) -> Self {
        Self {
            hosts: RwLock::new(hosts),
        }
    }

    /// Replace the host list; takes effect from the next cycle.
    pub fn replace(&self, hosts: Vec<RemoteHost>) {
        *self.hosts.write() = hosts;
    }

    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.read().is_empty()
    }
}

#[async_trait]
impl RemoteHostRegistry for StaticHostRegistry {
    async fn list_enabled(&self) -> Result<Vec<RemoteHost>, RegistryError> {
        let hosts = self.hosts.read().clone();
        Ok(enabled_unique(hosts))
    }
}

/// Keep enabled hosts, dropping repeated ids after their first occurrence.
pub(crate) fn enabled_unique(hosts: impl IntoIterator<Item = RemoteHost>) -> Vec<RemoteHost> {
    let mut seen = HashSet::new();
    hosts
        .into_iter()
        .filter(|host| host.enabled)
        .filter(|host| {
            let fresh = seen.insert(host.id.clone());
            if !fresh {
                warn!(host_id = %host.id, "Duplicate host id ignored");
            }
            fresh
        })
        .collect()
}
