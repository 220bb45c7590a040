//! # Nested Router
//!
//! Bridges a bundle's internal bus with the cluster's external bus.
//!
//! ```text
//! nested-router --config /etc/nested.toml
//! ```
//!
//! Bus addresses in the configuration select the transport: `nats://host:port`
//! for a NATS server, `mem://<name>` for an in-process bus.
//!
//! Exits non-zero when startup fails, zero after a signal-driven shutdown.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nested_bus::TransportConnector;
use nested_router::DEFAULT_CONFIG_PATH;
use nested_telemetry::{init_logging, register_metrics};
use router_runtime::{load_config, shutdown_signal, telemetry_config, RouterRuntime};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nested-router")]
#[command(about = "Inter-bundle message router for Nested")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(&telemetry_config(&config)).context("Failed to initialize logging")?;
    register_metrics().context("Failed to register metrics")?;

    info!(config = %args.config.display(), "Starting nested-router");

    let connector = TransportConnector::new();
    let runtime = RouterRuntime::start(&config, &connector).await?;

    info!("Router is running. Press Ctrl+C to stop.");
    shutdown_signal().await?;

    runtime.shutdown().await;
    Ok(())
}
