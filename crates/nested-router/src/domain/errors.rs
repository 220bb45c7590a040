//! Router error types.

use nested_bus::BusError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while bringing up or running the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// `BUNDLE_ID` is not `<GROUP>-<INDEX>`.
    #[error("invalid bundle id {raw:?}: expected <GROUP>-<INDEX>")]
    InvalidBundleId { raw: String },

    /// A bus connection, subscription, or request failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Configuration could not be loaded or is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker pool or queue was configured with size zero.
    #[error("{name} must be at least 1, got {value}")]
    InvalidPoolSize { name: &'static str, value: usize },

    /// `register_worker` was called on a worker that already left
    /// the initializing state.
    #[error("router worker already registered (state: {state})")]
    AlreadyRegistered { state: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_wrapped_errors_display_once() {
        let bus = RouterError::from(BusError::Closed);
        assert_eq!(bus.to_string(), "bus connection closed");
        assert!(bus.source().is_none());

        let config = RouterError::from(ConfigError::MissingBundleId);
        assert_eq!(config.to_string(), "BUNDLE_ID is not set");
    }
}
