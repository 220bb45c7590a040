//! # Nested Telemetry
//!
//! Logging and metrics shared by the router binary and library.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nested_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NESTED_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `NESTED_JSON_LOGS` | `false` | Emit JSON lines instead of text |
//! | `NESTED_SERVICE_NAME` | `nested-router` | Service name attached to startup logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, Direction, ROUTER_BRIDGED, ROUTER_DROPPED, ROUTER_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
