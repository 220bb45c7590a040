//! # Bridge
//!
//! One direction of the router: take an envelope received on the source bus,
//! strip the namespace prefix it was addressed with, issue it on the target
//! bus, and carry the reply back to the requester on the source bus.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nested_bus::{Envelope, MessageBus, Subject};
use nested_telemetry::{metric_inc, Direction, ROUTER_BRIDGED, ROUTER_DROPPED, ROUTER_FAILURES};
use tracing::{debug, warn};

use super::pool::EnvelopeHandler;
use crate::domain::{FailureKind, RouteFailure};

/// What happened to one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The subject carried none of the accepted prefixes.
    Dropped,
    /// Publish-only envelope forwarded to the target bus.
    Forwarded,
    /// Request answered and the reply handed back to the requester.
    Replied,
    /// The target bus failed; the requester received a failure marker.
    Failed(FailureKind),
}

/// One direction of the router.
pub struct Bridge {
    direction: Direction,
    /// Accepted prefixes, tried in order.
    prefixes: Vec<String>,
    /// Bus the envelopes arrive on and replies return to.
    source: Arc<dyn MessageBus>,
    /// Bus the rewritten envelopes are issued on.
    target: Arc<dyn MessageBus>,
    timeout: Duration,
}

impl Bridge {
    pub fn new(
        direction: Direction,
        prefixes: Vec<String>,
        source: Arc<dyn MessageBus>,
        target: Arc<dyn MessageBus>,
        timeout: Duration,
    ) -> Self {
        Self {
            direction,
            prefixes,
            source,
            target,
            timeout,
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The subject to use on the target bus, or `None` when `subject` is not
    /// addressed to this bridge.
    #[must_use]
    pub fn rewrite(&self, subject: &Subject) -> Option<Subject> {
        self.prefixes
            .iter()
            .find_map(|prefix| subject.strip_prefix(prefix))
    }

    /// Bridge one envelope end to end.
    pub async fn route(&self, envelope: Envelope) -> Outcome {
        let direction = self.direction.as_str();

        let Some(target_subject) = self.rewrite(&envelope.subject) else {
            debug!(direction, subject = %envelope.subject, "Subject outside router namespace, dropped");
            metric_inc!(ROUTER_DROPPED, &[direction]);
            return Outcome::Dropped;
        };

        let Some(reply_to) = envelope.reply_to else {
            return self.forward(target_subject, envelope.payload).await;
        };

        let (reply, outcome) = match self
            .target
            .request(target_subject.clone(), envelope.payload, self.timeout)
            .await
        {
            Ok(response) => (response.payload, Outcome::Replied),
            Err(e) => {
                let failure = RouteFailure::from_bus_error(target_subject.as_str(), &e);
                warn!(
                    direction,
                    subject = %target_subject,
                    kind = failure.kind.as_str(),
                    error = %e,
                    "Cross-bus request failed"
                );
                metric_inc!(ROUTER_FAILURES, &[direction, failure.kind.as_str()]);
                (failure.encode(), Outcome::Failed(failure.kind))
            }
        };

        if let Err(e) = self.source.publish(Envelope::new(reply_to.clone(), reply)).await {
            warn!(direction, reply_to = %reply_to, error = %e, "Failed to hand reply back");
        }

        if outcome == Outcome::Replied {
            metric_inc!(ROUTER_BRIDGED, &[direction]);
            debug!(direction, subject = %target_subject, "Request bridged");
        }
        outcome
    }

    async fn forward(&self, subject: Subject, payload: Vec<u8>) -> Outcome {
        let direction = self.direction.as_str();
        match self
            .target
            .publish(Envelope::new(subject.clone(), payload))
            .await
        {
            Ok(delivered) => {
                metric_inc!(ROUTER_BRIDGED, &[direction]);
                debug!(direction, subject = %subject, delivered, "Envelope forwarded");
                Outcome::Forwarded
            }
            Err(e) => {
                warn!(direction, subject = %subject, error = %e, "Forward failed");
                metric_inc!(ROUTER_FAILURES, &[direction, FailureKind::Transport.as_str()]);
                Outcome::Failed(FailureKind::Transport)
            }
        }
    }
}

#[async_trait]
impl EnvelopeHandler for Bridge {
    async fn handle(&self, envelope: Envelope) {
        self.route(envelope).await;
    }
}
