//! # Router Worker
//!
//! Owns the bidirectional bridge between the internal and external bus for
//! exactly one bundle instance.
//!
//! ## Subscriptions
//!
//! | Bus | Subject | Queue | Handler |
//! |-----|---------|-------|---------|
//! | internal | `ROUTER.>` | internal→external | `to_extern` |
//! | external | `<GROUP>-<INDEX>.>` | external→internal | `to_intern` |
//! | external | `<GROUP>.>` (queue group `<GROUP>`) | external→internal | `to_intern` |
//!
//! ## Lifecycle
//!
//! ```text
//! [Initializing] ──register_worker──→ [Running] ──shutdown──→ [Draining] ──→ [Stopped]
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use nested_bus::{Envelope, MessageBus, Subject, SubscriptionHandle};
use nested_telemetry::Direction;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use super::bridge::{Bridge, Outcome};
use super::pool::WorkerPool;
use crate::config::RouterConfig;
use crate::domain::{BundleAddress, Prefixes, RouterError};

/// Lifecycle state of a [`RouterWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Pool sizes, queue capacities, and request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub int_workers: usize,
    pub ext_workers: usize,
    pub int_buffer: usize,
    pub ext_buffer: usize,
    pub request_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            int_workers: 10,
            ext_workers: 10,
            int_buffer: 100,
            ext_buffer: 100,
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl WorkerSettings {
    /// Settings from the `[job]` section.
    #[must_use]
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            int_workers: config.job.int_workers_count,
            ext_workers: config.job.ext_workers_count,
            int_buffer: config.job.int_buffer_size,
            ext_buffer: config.job.ext_buffer_size,
            request_timeout: config.request_timeout(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RouterError> {
        let sizes = [
            ("int_workers_count", self.int_workers),
            ("ext_workers_count", self.ext_workers),
            ("int_buffer_size", self.int_buffer),
            ("ext_buffer_size", self.ext_buffer),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(RouterError::InvalidPoolSize { name, value });
            }
        }
        Ok(())
    }
}

/// Everything that exists only while the worker runs.
struct Running {
    pools: Vec<WorkerPool>,
    subscriptions: Vec<SubscriptionHandle>,
}

/// Bridges one bundle's internal bus with the cluster's external bus.
pub struct RouterWorker {
    address: BundleAddress,
    prefixes: Prefixes,
    settings: WorkerSettings,
    internal: Arc<dyn MessageBus>,
    external: Arc<dyn MessageBus>,
    /// Internal → external.
    outbound: Arc<Bridge>,
    /// External → internal.
    inbound: Arc<Bridge>,
    state: RwLock<WorkerState>,
    running: Mutex<Option<Running>>,
}

impl RouterWorker {
    /// Create a worker for `bundle_id`.
    ///
    /// # Errors
    ///
    /// `InvalidBundleId` for a malformed id, `InvalidPoolSize` when a pool or
    /// queue size is zero. Nothing is started on failure.
    pub fn new(
        bundle_id: &str,
        settings: WorkerSettings,
        internal: Arc<dyn MessageBus>,
        external: Arc<dyn MessageBus>,
    ) -> Result<Self, RouterError> {
        let address = BundleAddress::parse(bundle_id)?;
        settings.validate()?;
        let prefixes = address.prefixes();

        let outbound = Arc::new(Bridge::new(
            Direction::Outbound,
            vec![prefixes.internal.clone()],
            Arc::clone(&internal),
            Arc::clone(&external),
            settings.request_timeout,
        ));
        let inbound = Arc::new(Bridge::new(
            Direction::Inbound,
            vec![prefixes.unicast.clone(), prefixes.anycast.clone()],
            Arc::clone(&external),
            Arc::clone(&internal),
            settings.request_timeout,
        ));

        info!(
            bundle = %address,
            unicast = %prefixes.unicast,
            anycast = %prefixes.anycast,
            internal = %prefixes.internal,
            "Router worker initialized"
        );

        Ok(Self {
            address,
            prefixes,
            settings,
            internal,
            external,
            outbound,
            inbound,
            state: RwLock::new(WorkerState::Initializing),
            running: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn address(&self) -> &BundleAddress {
        &self.address
    }

    #[must_use]
    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    #[must_use]
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// Start both worker pools and subscribe on both buses.
    ///
    /// Returns once every subscription is in place. A subscription failure
    /// stops the pools already started and is returned as-is.
    pub async fn register_worker(&self) -> Result<(), RouterError> {
        let mut running = self.running.lock().await;
        {
            let state = self.state();
            if state != WorkerState::Initializing {
                return Err(RouterError::AlreadyRegistered {
                    state: state.to_string(),
                });
            }
        }

        let (int_tx, int_rx) = mpsc::channel(self.settings.int_buffer);
        let (ext_tx, ext_rx) = mpsc::channel(self.settings.ext_buffer);

        let pools = vec![
            WorkerPool::spawn(
                "internal",
                self.settings.int_workers,
                int_rx,
                Arc::clone(&self.outbound) as _,
            ),
            WorkerPool::spawn(
                "external",
                self.settings.ext_workers,
                ext_rx,
                Arc::clone(&self.inbound) as _,
            ),
        ];

        let subscriptions = match self.subscribe_all(int_tx, ext_tx).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(bundle = %self.address, error = %e, "Router subscription failed");
                for pool in pools {
                    pool.shutdown().await;
                }
                return Err(e);
            }
        };

        *running = Some(Running {
            pools,
            subscriptions,
        });
        *self.state.write() = WorkerState::Running;

        info!(
            bundle = %self.address,
            int_workers = self.settings.int_workers,
            ext_workers = self.settings.ext_workers,
            "Router worker running"
        );
        Ok(())
    }

    async fn subscribe_all(
        &self,
        int_tx: mpsc::Sender<Envelope>,
        ext_tx: mpsc::Sender<Envelope>,
    ) -> Result<Vec<SubscriptionHandle>, RouterError> {
        let internal = self
            .internal
            .channel_subscribe(wildcard(&self.prefixes.internal)?, int_tx)
            .await?;
        let unicast = self
            .external
            .channel_subscribe(wildcard(&self.prefixes.unicast)?, ext_tx.clone())
            .await?;
        let anycast = self
            .external
            .queue_channel_subscribe(
                wildcard(&self.prefixes.anycast)?,
                self.address.group(),
                ext_tx,
            )
            .await?;
        Ok(vec![internal, unicast, anycast])
    }

    /// Bridge one envelope from the internal bus to the external bus.
    pub async fn to_extern(&self, envelope: Envelope) -> Outcome {
        self.outbound.route(envelope).await
    }

    /// Bridge one envelope from the external bus to the internal bus.
    pub async fn to_intern(&self, envelope: Envelope) -> Outcome {
        self.inbound.route(envelope).await
    }

    /// Unsubscribe, let in-flight envelopes finish, and stop the pools.
    ///
    /// # Returns
    ///
    /// The number of queued envelopes abandoned.
    pub async fn shutdown(&self) -> usize {
        let mut running = self.running.lock().await;
        let Some(Running {
            pools,
            subscriptions,
        }) = running.take()
        else {
            *self.state.write() = WorkerState::Stopped;
            return 0;
        };

        *self.state.write() = WorkerState::Draining;
        info!(bundle = %self.address, "Router worker draining");

        // Stop accepting new queue items first.
        drop(subscriptions);

        let mut abandoned = 0;
        for pool in pools {
            abandoned += pool.shutdown().await;
        }

        *self.state.write() = WorkerState::Stopped;
        info!(bundle = %self.address, abandoned, "Router worker stopped");
        abandoned
    }
}

/// `prefix` followed by the tail wildcard.
fn wildcard(prefix: &str) -> Result<Subject, RouterError> {
    Ok(Subject::new(format!("{prefix}>"))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nested_bus::{BusError, InMemoryBus};
    use tokio::time::timeout;

    fn subject(raw: &str) -> Subject {
        Subject::new(raw).unwrap()
    }

    fn small_settings() -> WorkerSettings {
        WorkerSettings {
            int_workers: 2,
            ext_workers: 2,
            int_buffer: 4,
            ext_buffer: 4,
            request_timeout: Duration::from_millis(500),
        }
    }

    fn worker(id: &str) -> (RouterWorker, Arc<InMemoryBus>, Arc<InMemoryBus>) {
        let internal = Arc::new(InMemoryBus::new("int"));
        let external = Arc::new(InMemoryBus::new("ext"));
        let worker = RouterWorker::new(
            id,
            small_settings(),
            internal.clone(),
            external.clone(),
        )
        .unwrap();
        (worker, internal, external)
    }

    #[test]
    fn test_new_rejects_bad_bundle_id() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new("x"));
        let result = RouterWorker::new("BROKEN", small_settings(), bus.clone(), bus);
        assert!(matches!(result, Err(RouterError::InvalidBundleId { .. })));
    }

    #[test]
    fn test_new_rejects_empty_pool() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new("x"));
        let settings = WorkerSettings {
            ext_workers: 0,
            ..small_settings()
        };
        let result = RouterWorker::new("A-1", settings, bus.clone(), bus);
        assert!(matches!(
            result,
            Err(RouterError::InvalidPoolSize {
                name: "ext_workers_count",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_register_subscribes_both_buses() {
        let (worker, internal, external) = worker("nested-000");
        assert_eq!(worker.state(), WorkerState::Initializing);

        worker.register_worker().await.unwrap();

        assert_eq!(worker.state(), WorkerState::Running);
        assert_eq!(internal.subscriber_count(), 1);
        assert_eq!(external.subscriber_count(), 2);

        let again = worker.register_worker().await;
        assert!(matches!(again, Err(RouterError::AlreadyRegistered { .. })));

        worker.shutdown().await;
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(internal.subscriber_count(), 0);
        assert_eq!(external.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_register_fails_on_closed_bus() {
        let (worker, _internal, external) = worker("A-1");
        external.close();

        let result = worker.register_worker().await;
        assert!(matches!(result, Err(RouterError::Bus(BusError::Closed))));
        assert_eq!(worker.state(), WorkerState::Initializing);
    }

    #[tokio::test]
    async fn test_outbound_forwarding_strips_namespace() {
        let (worker, internal, external) = worker("POUYAN-0001");
        let mut tap = external.subscribe(subject("OTHERGROUP.>"), 4).await.unwrap();
        worker.register_worker().await.unwrap();

        internal
            .publish(Envelope::new(
                subject("ROUTER.OTHERGROUP.HELLO"),
                b"{\"hi\":1}".to_vec(),
            ))
            .await
            .unwrap();

        let seen = timeout(Duration::from_secs(1), tap.recv())
            .await
            .expect("timeout")
            .expect("envelope");
        assert_eq!(seen.subject, subject("OTHERGROUP.HELLO"));
        assert_eq!(seen.payload, b"{\"hi\":1}");

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_inbound_unicast_and_anycast() {
        let (worker, internal, external) = worker("A-0001");
        let mut service = internal.subscribe(subject("tasks.>"), 8).await.unwrap();
        worker.register_worker().await.unwrap();

        for addressed in ["A-0001.tasks.one", "A.tasks.two", "A-0002.tasks.three"] {
            external
                .publish(Envelope::new(subject(addressed), Vec::new()))
                .await
                .unwrap();
        }

        let first = timeout(Duration::from_secs(1), service.recv())
            .await
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_secs(1), service.recv())
            .await
            .unwrap()
            .unwrap();
        let mut seen = vec![first.subject.to_string(), second.subject.to_string()];
        seen.sort();
        assert_eq!(seen, vec!["tasks.one", "tasks.two"]);

        // A-0002 is another instance; nothing else arrives.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(service.try_recv().unwrap().is_none());

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_to_extern_guard_discards_foreign_subject() {
        let (worker, _internal, _external) = worker("A-1");
        let outcome = worker
            .to_extern(Envelope::new(subject("NOT.ROUTED"), Vec::new()))
            .await;
        assert_eq!(outcome, Outcome::Dropped);

        let outcome = worker
            .to_intern(Envelope::new(subject("B.tasks"), Vec::new()))
            .await;
        assert_eq!(outcome, Outcome::Dropped);
    }

    #[tokio::test]
    async fn test_shutdown_before_register() {
        let (worker, _internal, _external) = worker("A-1");
        assert_eq!(worker.shutdown().await, 0);
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(worker.register_worker().await.is_err());
    }
}
