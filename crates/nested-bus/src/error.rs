//! Bus error types.

use thiserror::Error;

/// Errors raised by bus connections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The subject is empty, has an empty token, or misplaces a wildcard.
    #[error("invalid subject {subject:?}: {reason}")]
    InvalidSubject {
        subject: String,
        reason: &'static str,
    },

    /// A request found nobody subscribed to its subject.
    #[error("no responders for {subject}")]
    NoResponders { subject: String },

    /// Every subscriber matching a request had a full queue.
    #[error("subscriber queue full for {subject}")]
    QueueFull { subject: String },

    /// A request did not receive a reply in time.
    #[error("request to {subject} timed out after {timeout_ms}ms")]
    Timeout { subject: String, timeout_ms: u64 },

    /// A reply was asked for a message that carries no reply subject.
    #[error("message on {subject} has no reply subject")]
    NoReplySubject { subject: String },

    /// The connection was closed.
    #[error("bus connection closed")]
    Closed,

    /// The connection string uses a scheme this connector cannot serve.
    #[error("unsupported bus address {address:?}")]
    UnsupportedAddress { address: String },

    /// The connection could not be established.
    #[error("failed to connect to {address:?}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// The transport refused or lost an operation on `subject`.
    #[error("transport failure on {subject}: {reason}")]
    Transport { subject: String, reason: String },
}

impl BusError {
    /// Whether the error means the remote side never answered.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
