//! Remote management host records.

use serde::{Deserialize, Serialize};

use crate::ids::HostId;

/// A remote management host the fleet is polled from.
///
/// Records are owned by whatever configuration source feeds the
/// aggregator; the telemetry core only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
    /// Stable identifier.
    pub id: HostId,

    /// Human-readable name.
    pub name: String,

    /// Base address of the management API (e.g. `https://pve1:8006`).
    pub address: String,

    /// Reference to the credential used for this host, never the secret.
    #[serde(default)]
    pub credential_ref: Option<String>,

    /// Whether the host takes part in polling.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Verify the remote TLS certificate.
    #[serde(default = "default_enabled")]
    pub verify_tls: bool,
}

fn default_enabled() -> bool {
    true
}

impl RemoteHost {
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: HostId::new(id),
            name: name.into(),
            address: address.into(),
            credential_ref: None,
            enabled: true,
            verify_tls: true,
        }
    }

    pub fn with_credential(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = Some(credential_ref.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
