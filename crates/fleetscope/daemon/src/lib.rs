//! fleetscope daemon library
//!
//! This crate provides the runtime pieces behind `fleetscoped`:
//! - Layered configuration (defaults, file, environment)
//! - HTTP client for Proxmox-style management APIs
//! - JSON-lines summary persistence
//! - Composition root and shutdown handling

pub mod config;
pub mod error;
pub mod http_client;
pub mod persister;
pub mod runtime;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use http_client::{HttpClientFactory, HttpRemoteClient};
pub use persister::JsonLinesPersister;
pub use runtime::Runtime;
