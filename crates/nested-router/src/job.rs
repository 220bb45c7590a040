//! # Job Handler
//!
//! Composition root of the router daemon.
//!
//! ## Initialization Phases
//!
//! 1. Validate the configuration (bundle id, pool sizes)
//! 2. Connect the internal bus
//! 3. Connect the external bus
//! 4. Build the Router Worker bound to both connections
//!
//! Any failure aborts; nothing is retried.

use std::sync::Arc;

use nested_bus::{BusConnector, MessageBus};
use tracing::{info, instrument};

use crate::config::RouterConfig;
use crate::domain::RouterError;
use crate::service::worker::{RouterWorker, WorkerSettings, WorkerState};

/// Owns both bus connections and the Router Worker.
pub struct JobHandler {
    internal: Arc<dyn MessageBus>,
    external: Arc<dyn MessageBus>,
    worker: RouterWorker,
}

impl JobHandler {
    /// Open both connections and build the worker.
    ///
    /// # Errors
    ///
    /// Configuration errors, or the connector's error for either address.
    #[instrument(name = "job_connect", skip_all)]
    pub async fn connect(
        config: &RouterConfig,
        connector: &dyn BusConnector,
    ) -> Result<Self, RouterError> {
        config.validate()?;
        let address = config.bundle_address()?;

        info!(address = %config.job.int_address, "Connecting internal bus");
        let internal = connector.connect(&config.job.int_address).await?;

        info!(address = %config.job.ext_address, "Connecting external bus");
        let external = connector.connect(&config.job.ext_address).await?;

        let worker = RouterWorker::new(
            &address.to_string(),
            WorkerSettings::from_config(config),
            Arc::clone(&internal),
            Arc::clone(&external),
        )?;

        Ok(Self {
            internal,
            external,
            worker,
        })
    }

    /// Start routing. The only startup entry point.
    pub async fn register_workers(&self) -> Result<(), RouterError> {
        self.worker.register_worker().await
    }

    /// Drain and stop the worker. Returns the number of abandoned envelopes.
    pub async fn shutdown(&self) -> usize {
        self.worker.shutdown().await
    }

    #[must_use]
    pub fn worker(&self) -> &RouterWorker {
        &self.worker
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// The internal bus connection, for services co-located with the router.
    #[must_use]
    pub fn internal(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.internal)
    }

    #[must_use]
    pub fn external(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.external)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use nested_bus::{BusError, MemoryConnector};

    fn config(bundle_id: &str) -> RouterConfig {
        let mut config = RouterConfig {
            bundle_id: Some(bundle_id.to_string()),
            ..RouterConfig::default()
        };
        config.job.int_address = format!("mem://{}-internal", bundle_id.to_lowercase());
        config.job.ext_address = "mem://cluster".to_string();
        config.job.int_workers_count = 2;
        config.job.ext_workers_count = 2;
        config
    }

    #[tokio::test]
    async fn test_connect_and_lifecycle() {
        let connector = MemoryConnector::new();
        let job = JobHandler::connect(&config("pouyan-0001"), &connector)
            .await
            .unwrap();

        assert_eq!(job.worker().address().to_string(), "POUYAN-0001");
        assert_eq!(job.state(), WorkerState::Initializing);
        assert_eq!(connector.bus_count(), 2);

        job.register_workers().await.unwrap();
        assert_eq!(job.state(), WorkerState::Running);
        assert_eq!(connector.bus("cluster").subscriber_count(), 2);

        assert_eq!(job.shutdown().await, 0);
        assert_eq!(job.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_connect_requires_bundle_id() {
        let connector = MemoryConnector::new();
        let result = JobHandler::connect(&RouterConfig::default(), &connector).await;
        assert!(matches!(
            result,
            Err(RouterError::Config(ConfigError::MissingBundleId))
        ));
        assert_eq!(connector.bus_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let connector = MemoryConnector::new();
        let mut config = config("A-1");
        config.job.ext_address = "nats://localhost:4222".to_string();

        let result = JobHandler::connect(&config, &connector).await;
        assert!(matches!(
            result,
            Err(RouterError::Bus(BusError::UnsupportedAddress { .. }))
        ));
    }
}
