//! # Envelope
//!
//! The unit carried by a bus: a subject, an opaque payload, and the subject a
//! requester is waiting on for the reply.

use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// A message on the bus.
///
/// The payload is never inspected by the bus or the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Where the message is addressed.
    pub subject: Subject,
    /// Opaque message body.
    pub payload: Vec<u8>,
    /// Inbox of the requester, when this message expects a reply.
    pub reply_to: Option<Subject>,
}

impl Envelope {
    /// Create a fire-and-forget envelope.
    #[must_use]
    pub fn new(subject: Subject, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject,
            payload: payload.into(),
            reply_to: None,
        }
    }

    /// Attach a reply subject.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: Subject) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    /// Whether a requester is waiting for a reply to this envelope.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}
