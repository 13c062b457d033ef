//! fleetscope daemon - fleet telemetry poller
//!
//! Polls every configured management host on a fixed interval, keeps the
//! latest fleet summary, logs it and optionally appends it to a JSON-lines
//! file.

use anyhow::Context;
use clap::Parser;
use fleetscope_daemon::{DaemonConfig, Runtime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// fleetscope daemon CLI
#[derive(Parser)]
#[command(name = "fleetscoped")]
#[command(about = "fleetscope - Fleet telemetry daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FLEETSCOPE_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "FLEETSCOPE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "FLEETSCOPE_LOG_JSON")]
    json: bool,

    /// Run one poll cycle, print the summary as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Initialize tracing
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let runtime = Runtime::new(&config).context("building runtime")?;

    if cli.once {
        let summary = runtime.run_once().await.context("poll cycle failed")?;
        println!("{}", serde_json::to_string_pretty(summary.as_ref())?);
        return Ok(());
    }

    runtime.run().await?;
    Ok(())
}
