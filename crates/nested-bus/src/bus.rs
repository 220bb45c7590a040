//! # Message Bus
//!
//! The interface the router and its clients use to reach a publish/subscribe
//! transport. Connections are shared by many tasks, so every method takes
//! `&self` and implementations must be safe for concurrent use.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::BusError;
use crate::subject::Subject;
use crate::subscriber::{Subscription, SubscriptionHandle};

/// A connection to a subject-based publish/subscribe bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish an envelope.
    ///
    /// # Returns
    ///
    /// The number of subscriber queues the envelope was delivered to. Rejected
    /// deliveries (full queues) are not counted. Transports that cannot
    /// observe deliveries report 1 on success.
    ///
    /// # Errors
    ///
    /// `InvalidSubject` for wildcard subjects, `Closed` after the connection
    /// was closed.
    async fn publish(&self, envelope: Envelope) -> Result<usize, BusError>;

    /// Publish `payload` on `subject` and wait up to `timeout` for one reply.
    ///
    /// # Errors
    ///
    /// - `NoResponders` when nobody subscribes to `subject`
    /// - `QueueFull` when every matching subscriber rejected the delivery
    /// - `Timeout` when no reply arrived in time
    async fn request(
        &self,
        subject: Subject,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Envelope, BusError>;

    /// Deliver every envelope matching `subject` into `queue`.
    ///
    /// The caller owns the queue and therefore its capacity. Several
    /// subscriptions may share one queue. The subscription lasts until the
    /// returned handle is dropped.
    async fn channel_subscribe(
        &self,
        subject: Subject,
        queue: mpsc::Sender<Envelope>,
    ) -> Result<SubscriptionHandle, BusError>;

    /// Like [`channel_subscribe`](Self::channel_subscribe), but each envelope
    /// is delivered to only one member of the named queue group.
    async fn queue_channel_subscribe(
        &self,
        subject: Subject,
        group: &str,
        queue: mpsc::Sender<Envelope>,
    ) -> Result<SubscriptionHandle, BusError>;

    /// Subscribe with a queue of `capacity` owned by the returned subscription.
    async fn subscribe(
        &self,
        subject: Subject,
        capacity: usize,
    ) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = self.channel_subscribe(subject, sender).await?;
        Ok(Subscription::new(handle, receiver))
    }

    /// Answer a request envelope on its reply subject.
    async fn respond(&self, request: &Envelope, payload: Vec<u8>) -> Result<usize, BusError> {
        let reply_to = request
            .reply_to
            .clone()
            .ok_or_else(|| BusError::NoReplySubject {
                subject: request.subject.to_string(),
            })?;
        self.publish(Envelope::new(reply_to, payload)).await
    }
}
