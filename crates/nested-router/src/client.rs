//! # Router Client
//!
//! Used by application services to address other bundles through the
//! router. Every call goes out on the service's own internal bus; the
//! `ROUTER.` namespace is added only when the target is not the local
//! group (anycast) or the local instance (unicast).
//!
//! ```text
//! prepare_anycast("HELLO", "EHSAN")        from POUYAN-0001 → ROUTER.EHSAN.HELLO
//! prepare_unicast("HELLO", "EHSAN-0002")   from POUYAN-0001 → ROUTER.EHSAN-0002.HELLO
//! prepare_anycast("HELLO", "pouyan")       from POUYAN-0001 → HELLO
//! ```

use std::sync::Arc;
use std::time::Duration;

use nested_bus::{BusError, Envelope, MessageBus, Subject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{BundleAddress, RouteFailure, ROUTER_NAMESPACE};

/// Errors surfaced to router callers.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The unicast target is not `<GROUP>-<INDEX>`, or the anycast target
    /// is not a single group token.
    #[error("invalid target bundle {raw:?}")]
    InvalidTarget { raw: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode reply: {0}")]
    Decode(#[source] serde_json::Error),

    /// The router answered with a failure marker instead of a reply.
    #[error("{0}")]
    Route(RouteFailure),
}

/// Addresses envelopes for the router on behalf of one bundle instance.
#[derive(Clone)]
pub struct RouterClient {
    address: BundleAddress,
    bus: Arc<dyn MessageBus>,
}

impl RouterClient {
    /// `bus` is the internal bus of the bundle `address` belongs to.
    pub fn new(address: BundleAddress, bus: Arc<dyn MessageBus>) -> Self {
        Self { address, bus }
    }

    #[must_use]
    pub fn address(&self) -> &BundleAddress {
        &self.address
    }

    /// Envelope reaching any one instance of `target_group`.
    pub fn prepare_anycast(
        &self,
        payload: Vec<u8>,
        subject: &str,
        target_group: &str,
    ) -> Result<Envelope, ClientError> {
        let subject = Subject::new(subject)?;
        let group = target_group.trim();
        if group.is_empty()
            || group.contains(['-', '.', '*', '>'])
            || group.contains(char::is_whitespace)
        {
            return Err(ClientError::InvalidTarget {
                raw: target_group.to_string(),
            });
        }
        if self.address.in_group(group) {
            return Ok(Envelope::new(subject, payload));
        }
        let target = group.to_uppercase();
        let routed = subject.prepend(&format!("{ROUTER_NAMESPACE}.{target}."))?;
        Ok(Envelope::new(routed, payload))
    }

    /// Envelope reaching exactly the instance `target_bundle_id`.
    pub fn prepare_unicast(
        &self,
        payload: Vec<u8>,
        subject: &str,
        target_bundle_id: &str,
    ) -> Result<Envelope, ClientError> {
        let subject = Subject::new(subject)?;
        let target =
            BundleAddress::parse(target_bundle_id).map_err(|_| ClientError::InvalidTarget {
                raw: target_bundle_id.to_string(),
            })?;
        if target == self.address {
            return Ok(Envelope::new(subject, payload));
        }
        let routed = subject.prepend(&format!("{ROUTER_NAMESPACE}.{target}."))?;
        Ok(Envelope::new(routed, payload))
    }

    /// Fire-and-forget anycast of a JSON body.
    pub async fn publish_anycast<T: Serialize>(
        &self,
        subject: &str,
        target_group: &str,
        body: &T,
    ) -> Result<(), ClientError> {
        let envelope = self.prepare_anycast(encode(body)?, subject, target_group)?;
        self.publish(envelope).await
    }

    /// Fire-and-forget unicast of a JSON body.
    pub async fn publish_unicast<T: Serialize>(
        &self,
        subject: &str,
        target_bundle_id: &str,
        body: &T,
    ) -> Result<(), ClientError> {
        let envelope = self.prepare_unicast(encode(body)?, subject, target_bundle_id)?;
        self.publish(envelope).await
    }

    /// Anycast request; waits up to `timeout` for the JSON reply.
    pub async fn request_anycast<T: Serialize, R: DeserializeOwned>(
        &self,
        subject: &str,
        target_group: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<R, ClientError> {
        let envelope = self.prepare_anycast(encode(body)?, subject, target_group)?;
        self.request(envelope, timeout).await
    }

    /// Unicast request; waits up to `timeout` for the JSON reply.
    pub async fn request_unicast<T: Serialize, R: DeserializeOwned>(
        &self,
        subject: &str,
        target_bundle_id: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<R, ClientError> {
        let envelope = self.prepare_unicast(encode(body)?, subject, target_bundle_id)?;
        self.request(envelope, timeout).await
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), ClientError> {
        let delivered = self.bus.publish(envelope).await?;
        debug!(bundle = %self.address, delivered, "Published through router");
        Ok(())
    }

    async fn request<R: DeserializeOwned>(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<R, ClientError> {
        let reply = self
            .bus
            .request(envelope.subject, envelope.payload, timeout)
            .await?;
        if let Some(failure) = RouteFailure::decode(&reply.payload) {
            return Err(ClientError::Route(failure));
        }
        serde_json::from_slice(&reply.payload).map_err(ClientError::Decode)
    }
}

fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>, ClientError> {
    serde_json::to_vec(body).map_err(ClientError::Encode)
}
