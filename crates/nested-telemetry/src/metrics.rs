//! Prometheus metrics for the router.
//!
//! All metrics follow the naming convention: `nested_router_<metric>_total`

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::TelemetryError;

/// Bridging direction, used as the `direction` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Internal bus to external bus.
    Outbound,
    /// External bus to internal bus.
    Inbound,
}

impl Direction {
    /// Label value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    /// Metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Envelopes bridged from one bus to the other
    pub static ref ROUTER_BRIDGED: IntCounterVec = IntCounterVec::new(
        Opts::new("nested_router_bridged_total", "Envelopes bridged between buses"),
        &["direction"]
    ).expect("metric creation failed");

    /// Envelopes discarded because their subject lacked the expected prefix
    pub static ref ROUTER_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("nested_router_dropped_total", "Envelopes dropped by the prefix filter"),
        &["direction"]
    ).expect("metric creation failed");

    /// Cross-bus requests that failed
    pub static ref ROUTER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("nested_router_failures_total", "Cross-bus requests that failed"),
        &["direction", "kind"]  // kind: timeout/no_responders/transport
    ).expect("metric creation failed");
}

/// Register all router metrics with [`REGISTRY`].
///
/// Calling this more than once fails with `MetricsInit`.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ROUTER_BRIDGED.clone()),
        Box::new(ROUTER_DROPPED.clone()),
        Box::new(ROUTER_FAILURES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
///
/// The runtime logs this snapshot at shutdown.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_encode() {
        // May fail if another test registered first, which is fine
        let _ = register_metrics();

        ROUTER_FAILURES
            .with_label_values(&[Direction::Inbound.as_str(), "timeout"])
            .inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("nested_router_failures_total"));
    }

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::Outbound.to_string(), "outbound");
        assert_eq!(Direction::Inbound.to_string(), "inbound");
    }
}
