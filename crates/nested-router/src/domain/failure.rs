//! Failure marker sent back to a requester when the bridge could not obtain
//! a reply.
//!
//! Wire format:
//!
//! ```json
//! {"router_error":{"kind":"timeout","subject":"EHSAN.HELLO","message":"..."}}
//! ```

use nested_bus::BusError;
use serde::{Deserialize, Serialize};

/// Why a bridged request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The far side did not answer within the request timeout.
    Timeout,
    /// Nobody on the far bus subscribes to the subject.
    NoResponders,
    /// Any other transport failure.
    Transport,
}

impl FailureKind {
    /// Metric label for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NoResponders => "no_responders",
            Self::Transport => "transport",
        }
    }
}

/// A typed "request failed" reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFailure {
    pub kind: FailureKind,
    /// Subject the bridge requested on the far bus.
    pub subject: String,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
struct Marker {
    router_error: RouteFailure,
}

impl RouteFailure {
    /// Classify a bus error raised while requesting `subject`.
    #[must_use]
    pub fn from_bus_error(subject: &str, error: &BusError) -> Self {
        let kind = match error {
            BusError::Timeout { .. } => FailureKind::Timeout,
            BusError::NoResponders { .. } => FailureKind::NoResponders,
            _ => FailureKind::Transport,
        };
        Self {
            kind,
            subject: subject.to_string(),
            message: error.to_string(),
        }
    }

    /// Serialize as a reply payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let marker = Marker {
            router_error: self.clone(),
        };
        // Plain strings and a unit enum cannot fail to serialize.
        serde_json::to_vec(&marker).unwrap_or_default()
    }

    /// Recognise a failure marker in a reply payload.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Marker>(payload)
            .ok()
            .map(|marker| marker.router_error)
    }
}

impl std::fmt::Display for RouteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "routing {} failed ({}): {}",
            self.subject,
            self.kind.as_str(),
            self.message
        )
    }
}
