//! # Connectors
//!
//! Turn a connection string into a bus connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::bus::MessageBus;
use crate::error::BusError;
use crate::memory::InMemoryBus;
use crate::nats::NatsBus;
use crate::{MEMORY_SCHEME, NATS_SCHEME};

/// Opens bus connections from connection strings.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Connect to the bus at `address`.
    async fn connect(&self, address: &str) -> Result<Arc<dyn MessageBus>, BusError>;
}

/// Connector for in-process buses addressed as `mem://<name>`.
///
/// Connecting twice to the same name yields the same bus, so several
/// routers living in one process can share an external bus. Clones share
/// the same set of buses.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    buses: Arc<Mutex<HashMap<String, Arc<InMemoryBus>>>>,
}

impl MemoryConnector {
    /// Create a connector with no buses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The bus registered under `name`, creating it on first use.
    #[must_use]
    pub fn bus(&self, name: &str) -> Arc<InMemoryBus> {
        let mut buses = self.buses.lock();
        Arc::clone(
            buses
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(InMemoryBus::new(name))),
        )
    }

    /// Number of distinct buses created so far.
    #[must_use]
    pub fn bus_count(&self) -> usize {
        self.buses.lock().len()
    }
}

/// Extract the bus name from a `mem://<name>` address.
fn memory_name(address: &str) -> Result<&str, BusError> {
    let name = address
        .strip_prefix(MEMORY_SCHEME)
        .ok_or_else(|| BusError::UnsupportedAddress {
            address: address.to_string(),
        })?;
    let name = name.trim_end_matches('/');
    if name.is_empty() {
        return Err(BusError::ConnectionFailed {
            address: address.to_string(),
            reason: "missing bus name".to_string(),
        });
    }
    Ok(name)
}

#[async_trait]
impl BusConnector for MemoryConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn MessageBus>, BusError> {
        let name = memory_name(address.trim())?;
        let bus = self.bus(name);
        if bus.is_closed() {
            return Err(BusError::ConnectionFailed {
                address: address.to_string(),
                reason: "bus is closed".to_string(),
            });
        }
        info!(address = %address, "Connected to in-memory bus");
        Ok(bus)
    }
}

/// Connector choosing the transport from the address scheme.
///
/// `nats://` addresses open a [`NatsBus`]; `mem://` addresses are served by
/// the wrapped [`MemoryConnector`].
#[derive(Clone, Default)]
pub struct TransportConnector {
    memory: MemoryConnector,
}

impl TransportConnector {
    /// Create a connector with an empty set of in-memory buses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The connector serving `mem://` addresses.
    #[must_use]
    pub fn memory(&self) -> &MemoryConnector {
        &self.memory
    }
}

#[async_trait]
impl BusConnector for TransportConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn MessageBus>, BusError> {
        let address = address.trim();
        if address.starts_with(NATS_SCHEME) {
            Ok(Arc::new(NatsBus::connect(address).await?))
        } else if address.starts_with(MEMORY_SCHEME) {
            self.memory.connect(address).await
        } else {
            Err(BusError::UnsupportedAddress {
                address: address.to_string(),
            })
        }
    }
}
