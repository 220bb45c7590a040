//! # NATS Bus
//!
//! [`MessageBus`] over a NATS server connection.
//!
//! Subscriptions are served by a forwarding task per subscription that
//! moves messages from the NATS subscriber into the caller's queue. The
//! queue never blocks the task: a full queue rejects the message the same
//! way the in-memory bus does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_nats::{Client, ConnectOptions, RequestErrorKind};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::subject::Subject;
use crate::subscriber::SubscriptionHandle;

/// Connection to a NATS server.
pub struct NatsBus {
    client: Client,

    /// Server address, for logs.
    address: String,

    /// Next subscription id.
    next_id: AtomicU64,

    /// Total deliveries rejected on full queues.
    rejected: Arc<AtomicU64>,
}

impl NatsBus {
    /// Connect to the server at `address` (`nats://host:port`).
    ///
    /// Request deadlines come from each [`MessageBus::request`] call, so the
    /// client-wide request timeout is disabled.
    pub async fn connect(address: &str) -> Result<Self, BusError> {
        let client = ConnectOptions::new()
            .request_timeout(None)
            .connect(address)
            .await
            .map_err(|e| BusError::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        info!(address = %address, "Connected to NATS");

        Ok(Self {
            client,
            address: address.to_string(),
            next_id: AtomicU64::new(1),
            rejected: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Server address this bus connected to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Total deliveries rejected on full queues.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Start forwarding `subscriber` into `queue` and return its handle.
    fn forward(
        &self,
        subject: Subject,
        group: Option<String>,
        mut subscriber: async_nats::Subscriber,
        queue: mpsc::Sender<Envelope>,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicU64::new(0));
        let rejected = Arc::clone(&self.rejected);
        let counter = Arc::clone(&dropped);
        let pattern = subject.clone();

        let task = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let subject = message.subject.to_string();
                let reply = message.reply.as_ref().map(ToString::to_string);
                let Some(envelope) =
                    envelope_from_parts(&subject, reply.as_deref(), &message.payload)
                else {
                    warn!(subject = %subject, "Skipping message with unusable subject");
                    continue;
                };
                match queue.try_send(envelope) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(envelope)) => {
                        counter.fetch_add(1, Ordering::Relaxed);
                        rejected.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            subject = %envelope.subject,
                            subscription = %pattern,
                            "Slow consumer, delivery rejected"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            debug!(subscription = %pattern, "Forwarding stopped");
        });

        debug!(
            address = %self.address,
            subject = %subject,
            group = ?group,
            id,
            "New subscription created"
        );

        SubscriptionHandle::new(id, subject, group, dropped, move || task.abort())
    }
}

/// Build an envelope from the parts of a received NATS message.
///
/// Returns `None` when the subject or reply subject is not a valid subject.
fn envelope_from_parts(subject: &str, reply: Option<&str>, payload: &[u8]) -> Option<Envelope> {
    let envelope = Envelope::new(Subject::new(subject).ok()?, payload.to_vec());
    match reply {
        Some(reply) => Some(envelope.with_reply_to(Subject::new(reply).ok()?)),
        None => Some(envelope),
    }
}

/// Map a failed NATS request onto a bus error.
fn request_error(
    subject: &Subject,
    timeout: Duration,
    kind: RequestErrorKind,
    detail: String,
) -> BusError {
    match kind {
        RequestErrorKind::TimedOut => timeout_error(subject, timeout),
        RequestErrorKind::NoResponders => BusError::NoResponders {
            subject: subject.to_string(),
        },
        _ => BusError::Transport {
            subject: subject.to_string(),
            reason: detail,
        },
    }
}

fn timeout_error(subject: &Subject, timeout: Duration) -> BusError {
    BusError::Timeout {
        subject: subject.to_string(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

fn transport_error(subject: &Subject, error: impl std::fmt::Display) -> BusError {
    BusError::Transport {
        subject: subject.to_string(),
        reason: error.to_string(),
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, envelope: Envelope) -> Result<usize, BusError> {
        if envelope.subject.is_wildcard() {
            return Err(BusError::InvalidSubject {
                subject: envelope.subject.to_string(),
                reason: "cannot publish to a wildcard subject",
            });
        }

        let subject = envelope.subject.to_string();
        let result = match envelope.reply_to {
            Some(reply) => {
                self.client
                    .publish_with_reply(subject, reply.to_string(), envelope.payload.into())
                    .await
            }
            None => self.client.publish(subject, envelope.payload.into()).await,
        };
        result.map_err(|e| transport_error(&envelope.subject, e))?;

        debug!(address = %self.address, subject = %envelope.subject, "Envelope published");
        Ok(1)
    }

    async fn request(
        &self,
        subject: Subject,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Envelope, BusError> {
        let reply = tokio::time::timeout(
            timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .map_err(|_| timeout_error(&subject, timeout))?
        .map_err(|e| request_error(&subject, timeout, e.kind(), e.to_string()))?;

        let reply_subject = reply.subject.to_string();
        envelope_from_parts(&reply_subject, None, &reply.payload).ok_or_else(|| {
            BusError::Transport {
                subject: subject.to_string(),
                reason: format!("reply on unusable subject {reply_subject:?}"),
            }
        })
    }

    async fn channel_subscribe(
        &self,
        subject: Subject,
        queue: mpsc::Sender<Envelope>,
    ) -> Result<SubscriptionHandle, BusError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| transport_error(&subject, e))?;
        Ok(self.forward(subject, None, subscriber, queue))
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
        let subscriber = self
            .client
            .queue_subscribe(subject.to_string(), group.to_string())
            .await
            .map_err(|e| transport_error(&subject, e))?;
        Ok(self.forward(subject, Some(group.to_string()), subscriber, queue))
    }
}
