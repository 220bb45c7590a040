//! # Nested Router Runtime
//!
//! Startup and shutdown of the router daemon.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment)
//! 2. Initialize logging and metrics
//! 3. Connect internal and external bus
//! 4. Register the Router Worker
//! 5. Run until SIGINT/SIGTERM, then drain and stop
//! 6. Log the final metrics snapshot
//!
//! Any failure in steps 1-4 aborts startup.

use std::path::Path;

use anyhow::{Context, Result};
use nested_bus::BusConnector;
use nested_router::{JobHandler, RouterConfig, WorkerState};
use nested_telemetry::{encode_metrics, TelemetryConfig};
use tracing::{debug, info, warn};

/// Configuration from `path` with environment overrides applied.
pub fn load_config(path: &Path) -> Result<RouterConfig> {
    let mut config = RouterConfig::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    config
        .apply_env()
        .context("Invalid environment override")?;
    Ok(config)
}

/// Logging settings taken from the router configuration.
#[must_use]
pub fn telemetry_config(config: &RouterConfig) -> TelemetryConfig {
    TelemetryConfig {
        log_level: config.log.level.clone(),
        json_logs: config.log.json,
        ..TelemetryConfig::default()
    }
}

/// Router metrics in Prometheus text format.
pub fn metrics_snapshot() -> Result<String> {
    encode_metrics().context("Failed to encode metrics")
}

/// A started router.
pub struct RouterRuntime {
    job: JobHandler,
}

impl RouterRuntime {
    /// Connect both buses and register the Router Worker.
    pub async fn start(config: &RouterConfig, connector: &dyn BusConnector) -> Result<Self> {
        let job = JobHandler::connect(config, connector)
            .await
            .context("Failed to connect buses")?;
        job.register_workers()
            .await
            .context("Failed to register router worker")?;

        let prefixes = job.worker().prefixes();
        info!(
            bundle = %job.worker().address(),
            unicast = %prefixes.unicast,
            anycast = %prefixes.anycast,
            "Router is running"
        );
        Ok(Self { job })
    }

    #[must_use]
    pub fn job(&self) -> &JobHandler {
        &self.job
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.job.state()
    }

    /// Drain in-flight work and stop every worker.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        let abandoned = self.job.shutdown().await;
        if abandoned > 0 {
            warn!(abandoned, "Shutdown abandoned queued envelopes");
        }
        match metrics_snapshot() {
            Ok(snapshot) => debug!(metrics = %snapshot, "Final metrics"),
            Err(e) => warn!(error = %e, "Final metrics unavailable"),
        }
        info!("Shutdown complete");
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).context("Failed to hook SIGTERM")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to hook SIGINT")?,
            _ = terminate.recv() => info!("SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to hook SIGINT")?;
    }
    Ok(())
}
