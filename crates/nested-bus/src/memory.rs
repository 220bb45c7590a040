//! # In-Memory Bus
//!
//! Process-local implementation of [`MessageBus`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bus::MessageBus;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::subject::Subject;
use crate::subscriber::SubscriptionHandle;
use crate::INBOX_PREFIX;

/// One registered subscription.
struct Entry {
    id: u64,
    pattern: Subject,
    group: Option<String>,
    sender: mpsc::Sender<Envelope>,
    dropped: Arc<AtomicU64>,
}

/// State shared with subscription handles so they can unregister themselves.
#[derive(Default)]
struct Shared {
    entries: RwLock<Vec<Entry>>,
    closed: AtomicBool,
}

/// Outcome of offering an envelope to one subscriber.
enum Offer {
    Accepted,
    Full,
    Gone,
}

/// Result of fanning one envelope out to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Delivery {
    /// Subscriptions (counting each queue group once) whose subject matched.
    matched: usize,
    /// Queues that accepted the envelope.
    delivered: usize,
}

/// In-memory publish/subscribe bus.
///
/// Delivery never blocks: a subscriber whose queue is full has the envelope
/// rejected, and the rejection is counted both on its subscription and on the
/// bus. Queue groups receive each envelope once, rotating between members.
pub struct InMemoryBus {
    /// Name used in logs.
    name: String,

    /// Registered subscriptions.
    shared: Arc<Shared>,

    /// Next subscription id.
    next_id: AtomicU64,

    /// Total envelopes published.
    published: AtomicU64,

    /// Total deliveries rejected on full queues.
    rejected: AtomicU64,

    /// Queue group rotation cursor.
    rotation: AtomicUsize,
}

impl InMemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            rotation: AtomicUsize::new(0),
        }
    }

    /// Bus name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.entries.read().len()
    }

    /// Total envelopes published.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total deliveries rejected on full queues.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Close the bus. Every subscription queue is disconnected and further
    /// operations fail with [`BusError::Closed`].
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.entries.write().clear();
        debug!(bus = %self.name, "Bus closed");
    }

    fn register(
        &self,
        subject: Subject,
        group: Option<String>,
        sender: mpsc::Sender<Envelope>,
    ) -> Result<SubscriptionHandle, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicU64::new(0));
        self.shared.entries.write().push(Entry {
            id,
            pattern: subject.clone(),
            group: group.clone(),
            sender,
            dropped: Arc::clone(&dropped),
        });

        debug!(bus = %self.name, subject = %subject, group = ?group, id, "New subscription created");

        let shared = Arc::downgrade(&self.shared);
        Ok(SubscriptionHandle::new(id, subject, group, dropped, move || {
            if let Some(shared) = shared.upgrade() {
                shared.entries.write().retain(|entry| entry.id != id);
            }
        }))
    }

    fn offer(entry: &Entry, envelope: &Envelope) -> Offer {
        match entry.sender.try_send(envelope.clone()) {
            Ok(()) => Offer::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Gone,
        }
    }

    fn reject(&self, entry: &Entry, envelope: &Envelope) {
        entry.dropped.fetch_add(1, Ordering::Relaxed);
        self.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
            bus = %self.name,
            subject = %envelope.subject,
            subscription = %entry.pattern,
            "Slow consumer, delivery rejected"
        );
    }

    fn deliver(&self, envelope: &Envelope) -> Result<Delivery, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        if envelope.subject.is_wildcard() {
            return Err(BusError::InvalidSubject {
                subject: envelope.subject.to_string(),
                reason: "cannot publish to a wildcard subject",
            });
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        let entries = self.shared.entries.read();
        let mut direct = Vec::new();
        let mut groups: BTreeMap<&str, Vec<&Entry>> = BTreeMap::new();
        for entry in entries
            .iter()
            .filter(|entry| envelope.subject.matches(&entry.pattern))
        {
            match entry.group.as_deref() {
                Some(group) => groups.entry(group).or_default().push(entry),
                None => direct.push(entry),
            }
        }

        let mut delivery = Delivery {
            matched: direct.len() + groups.len(),
            delivered: 0,
        };

        for entry in direct {
            match Self::offer(entry, envelope) {
                Offer::Accepted => delivery.delivered += 1,
                Offer::Full => self.reject(entry, envelope),
                Offer::Gone => {}
            }
        }

        let start = self.rotation.fetch_add(1, Ordering::Relaxed);
        for members in groups.values() {
            let mut first_full = None;
            let mut accepted = false;
            for offset in 0..members.len() {
                let member = members[(start + offset) % members.len()];
                match Self::offer(member, envelope) {
                    Offer::Accepted => {
                        accepted = true;
                        break;
                    }
                    Offer::Full => {
                        first_full.get_or_insert(member);
                    }
                    Offer::Gone => {}
                }
            }
            if accepted {
                delivery.delivered += 1;
            } else if let Some(member) = first_full {
                self.reject(member, envelope);
            }
        }

        Ok(delivery)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, envelope: Envelope) -> Result<usize, BusError> {
        let delivery = self.deliver(&envelope)?;
        debug!(
            bus = %self.name,
            subject = %envelope.subject,
            matched = delivery.matched,
            delivered = delivery.delivered,
            "Envelope published"
        );
        Ok(delivery.delivered)
    }

    async fn request(
        &self,
        subject: Subject,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Envelope, BusError> {
        let inbox = Subject::new(format!("{INBOX_PREFIX}{}", Uuid::new_v4().simple()))?;
        let mut reply = self.subscribe(inbox.clone(), 1).await?;

        let envelope = Envelope::new(subject.clone(), payload).with_reply_to(inbox);
        let delivery = self.deliver(&envelope)?;
        if delivery.matched == 0 {
            return Err(BusError::NoResponders {
                subject: subject.to_string(),
            });
        }
        if delivery.delivered == 0 {
            return Err(BusError::QueueFull {
                subject: subject.to_string(),
            });
        }

        match tokio::time::timeout(timeout, reply.recv()).await {
            Ok(Some(envelope)) => Ok(envelope),
            Ok(None) => Err(BusError::Closed),
            Err(_) => Err(BusError::Timeout {
                subject: subject.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn channel_subscribe(
        &self,
        subject: Subject,
        queue: mpsc::Sender<Envelope>,
    ) -> Result<SubscriptionHandle, BusError> {
        self.register(subject, None, queue)
    }

    async fn queue_channel_subscribe(
        &self,
        subject: Subject,
        group: &str,
        queue: mpsc::Sender<Envelope>,
    ) -> Result<SubscriptionHandle, BusError> {
        if group.is_empty() || group.chars().any(char::is_whitespace) {
            return Err(BusError::InvalidSubject {
                subject: group.to_string(),
                reason: "invalid queue group name",
            });
        }
        self.register(subject, Some(group.to_string()), queue)
    }
}
