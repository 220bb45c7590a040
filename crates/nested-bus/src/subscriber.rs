//! # Subscriptions
//!
//! Handles that keep a subscription registered, and the owned-queue
//! subscription used by services that read their own messages.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::BusError;
use crate::subject::Subject;

type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Registration of one subscription on a bus.
///
/// When dropped, the subscription is removed from the bus.
pub struct SubscriptionHandle {
    /// Bus-assigned identifier.
    id: u64,

    /// Subscribed subject, possibly a wildcard.
    subject: Subject,

    /// Queue group, for load-balanced subscriptions.
    queue_group: Option<String>,

    /// Deliveries rejected because the queue was full.
    dropped: Arc<AtomicU64>,

    /// Removes the registration from the bus.
    unsubscribe: Option<Unsubscribe>,
}

impl SubscriptionHandle {
    /// Create a handle. `unsubscribe` runs once, when the handle is dropped.
    pub fn new(
        id: u64,
        subject: Subject,
        queue_group: Option<String>,
        dropped: Arc<AtomicU64>,
        unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            subject,
            queue_group,
            dropped,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Bus-assigned identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribed subject.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Queue group, if any.
    #[must_use]
    pub fn queue_group(&self) -> Option<&str> {
        self.queue_group.as_deref()
    }

    /// Number of deliveries rejected because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Remove the subscription now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
        debug!(subject = %self.subject, id = self.id, "Subscription dropped");
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .field("queue_group", &self.queue_group)
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// A subscription that owns its bounded queue.
pub struct Subscription {
    handle: SubscriptionHandle,
    receiver: mpsc::Receiver<Envelope>,
}

impl Subscription {
    /// Pair a handle with the receiving end of its queue.
    #[must_use]
    pub fn new(handle: SubscriptionHandle, receiver: mpsc::Receiver<Envelope>) -> Self {
        Self { handle, receiver }
    }

    /// Receive the next envelope.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next delivered envelope
    /// - `None` - The bus was closed
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Receive without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(envelope))` - An envelope was queued
    /// - `Ok(None)` - The queue is empty
    /// - `Err(BusError::Closed)` - The bus was closed
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, BusError> {
        match self.receiver.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(BusError::Closed),
        }
    }

    /// Number of envelopes waiting in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Maximum number of queued envelopes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.receiver.max_capacity()
    }

    /// Subscribed subject.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        self.handle.subject()
    }

    /// Number of deliveries rejected because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.handle.dropped()
    }
}

impl Stream for Subscription {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
