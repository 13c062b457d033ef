//! Daemon composition and lifecycle

use std::sync::Arc;

use fleetscope_aggregator::{Aggregator, StaticHostRegistry, SubscriberError};
use fleetscope_resilience::ResilientInvoker;
use fleetscope_types::FleetSummary;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use crate::http_client::HttpClientFactory;
use crate::persister::JsonLinesPersister;

/// Wires configuration, clients and the aggregator together.
pub struct Runtime {
    aggregator: Aggregator,
    registry: Arc<StaticHostRegistry>,
}

impl Runtime {
    /// Create a runtime from validated configuration
    pub fn new(config: &DaemonConfig) -> DaemonResult<Self> {
        config.validate()?;

        let registry = Arc::new(StaticHostRegistry::new(config.hosts.clone()));
        let clients = Arc::new(HttpClientFactory::new(config.request_timeout()));
        let invoker = Arc::new(ResilientInvoker::new(config.resilience_config()));

        let mut builder = Aggregator::builder(registry.clone(), clients)
            .config(config.aggregator_config())
            .invoker(invoker);

        if let Some(path) = &config.persistence.path {
            info!(path = %path.display(), "Persisting fleet summaries");
            builder = builder.persister(Arc::new(JsonLinesPersister::new(path)));
        }

        let aggregator = builder.build();
        aggregator.subscribe(log_summary);

        Ok(Self {
            aggregator,
            registry,
        })
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn registry(&self) -> &Arc<StaticHostRegistry> {
        &self.registry
    }

    /// Poll until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        info!(hosts = self.registry.len(), "fleetscope daemon starting");
        if self.registry.is_empty() {
            warn!("No hosts configured; summaries will be empty");
        }

        self.aggregator.start();
        shutdown_signal().await;

        info!("fleetscope daemon shutting down");
        self.aggregator.stop().await;

        Ok(())
    }

    /// Run a single cycle and return its summary
    pub async fn run_once(self) -> DaemonResult<Arc<FleetSummary>> {
        Ok(self.aggregator.poll_once().await?)
    }
}

/// Subscriber that reports each cycle in the log.
fn log_summary(summary: &FleetSummary) -> Result<(), SubscriberError> {
    let totals = &summary.totals;
    info!(
        hosts = totals.hosts_total,
        failed = totals.hosts_failed,
        nodes_online = totals.nodes_online,
        nodes = totals.nodes_total,
        containers_running = totals.containers_running,
        containers = totals.containers_total,
        cpu_percent = totals.average_cpu_percent,
        "Fleet summary updated"
    );

    for host in summary.hosts.iter().filter(|h| h.is_error()) {
        warn!(
            host_id = %host.host_id,
            error = host.error.as_deref().unwrap_or_default(),
            "Host unavailable"
        );
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
