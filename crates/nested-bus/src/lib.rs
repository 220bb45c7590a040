//! # Nested Bus - Subject-Based Publish/Subscribe Boundary
//!
//! The router talks to both of its buses exclusively through the narrow
//! [`MessageBus`] trait defined here. Two implementations ship with it:
//! [`NatsBus`] for `nats://` connection strings, and the in-process
//! [`InMemoryBus`] used for `mem://` connection strings and as the fake bus in
//! every test. [`TransportConnector`] picks between them by scheme.
//!
//! ## Subjects
//!
//! Subjects are dot-delimited hierarchical strings (`EHSAN.HELLO`). Subscriptions
//! may use two wildcards:
//!
//! - `*` matches exactly one token (`EHSAN.*` matches `EHSAN.HELLO`)
//! - `>` as the last token matches one or more tokens (`ROUTER.>` matches
//!   `ROUTER.EHSAN.HELLO`)
//!
//! ## Request / Reply
//!
//! ```text
//! requester                         bus                          responder
//!     │  subscribe _INBOX.<id>       │                                │
//!     │ ───────────────────────────→ │                                │
//!     │  publish subject             │                                │
//!     │  (reply_to = _INBOX.<id>)    │      deliver                   │
//!     │ ───────────────────────────→ │ ─────────────────────────────→ │
//!     │                              │      publish _INBOX.<id>       │
//!     │          deliver             │ ←───────────────────────────── │
//!     │ ←─────────────────────────── │                                │
//! ```
//!
//! ## Backpressure
//!
//! Every subscription delivers into a bounded queue owned by the subscriber.
//! When that queue is full the delivery is rejected: the message is dropped for
//! that subscriber, counted, and logged as a slow consumer. Queues never grow
//! past their capacity.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod connector;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod nats;
pub mod subject;
pub mod subscriber;

// Re-export main types
pub use bus::MessageBus;
pub use connector::{BusConnector, MemoryConnector, TransportConnector};
pub use envelope::Envelope;
pub use error::BusError;
pub use memory::InMemoryBus;
pub use nats::NatsBus;
pub use subject::Subject;
pub use subscriber::{Subscription, SubscriptionHandle};

/// Prefix of the one-shot reply subjects created by [`MessageBus::request`].
pub const INBOX_PREFIX: &str = "_INBOX.";

/// Queue capacity used for subscriptions created without an explicit size.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Connection string scheme served by [`MemoryConnector`].
pub const MEMORY_SCHEME: &str = "mem://";

/// Connection string scheme served by [`NatsBus`].
pub const NATS_SCHEME: &str = "nats://";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_prefix_is_a_subject_prefix() {
        assert!(INBOX_PREFIX.ends_with('.'));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 100);
    }
}
