//! Test harness: bundles sharing one external bus.

use std::sync::Arc;
use std::time::Duration;

use nested_bus::{InMemoryBus, MemoryConnector, MessageBus, Subject, Subscription};
use nested_router::{BundleAddress, RouterClient, RouterConfig};
use router_runtime::RouterRuntime;

/// Name of the shared external bus.
pub const CLUSTER: &str = "cluster";

/// One running bundle: its router and its internal bus.
pub struct Bundle {
    pub runtime: RouterRuntime,
    pub internal: Arc<InMemoryBus>,
    pub client: RouterClient,
}

impl Bundle {
    /// Subscribe a "service" on this bundle's internal bus.
    pub async fn serve(&self, subject: &str) -> Subscription {
        self.internal
            .subscribe(Subject::new(subject).expect("subject"), 16)
            .await
            .expect("subscribe")
    }

    /// Answer every request on `subject` with `reply(payload)`.
    pub async fn respond_with<F>(&self, subject: &str, reply: F)
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let mut service = self.serve(subject).await;
        let bus = Arc::clone(&self.internal);
        tokio::spawn(async move {
            while let Some(request) = service.recv().await {
                let body = reply(&request.payload);
                let _ = bus.respond(&request, body).await;
            }
        });
    }
}

/// Several bundles in one process, wired the way the daemon wires them.
pub struct RoutingHarness {
    pub connector: MemoryConnector,
}

impl Default for RoutingHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingHarness {
    pub fn new() -> Self {
        Self {
            connector: MemoryConnector::new(),
        }
    }

    pub fn config(bundle_id: &str) -> RouterConfig {
        let mut config = RouterConfig {
            bundle_id: Some(bundle_id.to_string()),
            ..RouterConfig::default()
        };
        config.job.int_address = format!("mem://{}", bundle_id.to_lowercase());
        config.job.ext_address = format!("mem://{CLUSTER}");
        config.job.int_workers_count = 4;
        config.job.ext_workers_count = 4;
        config.job.request_timeout_secs = 2;
        config
    }

    /// Start a router for `bundle_id` with the default test configuration.
    pub async fn bundle(&self, bundle_id: &str) -> Bundle {
        self.bundle_with(Self::config(bundle_id)).await
    }

    pub async fn bundle_with(&self, config: RouterConfig) -> Bundle {
        let runtime = RouterRuntime::start(&config, &self.connector)
            .await
            .expect("router start");
        let internal = self
            .connector
            .bus(config.job.int_address.trim_start_matches("mem://"));
        let address = BundleAddress::parse(config.bundle_id.as_deref().unwrap_or_default())
            .expect("bundle id");
        let client = RouterClient::new(address, internal.clone());
        Bundle {
            runtime,
            internal,
            client,
        }
    }

    pub fn external(&self) -> Arc<InMemoryBus> {
        self.connector.bus(CLUSTER)
    }
}

/// Generous bound for anything that should happen promptly.
pub const PROMPT: Duration = Duration::from_secs(10);
