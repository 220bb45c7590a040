//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for logs
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or a full
    /// `EnvFilter` directive such as `nested_router=debug,info`)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "nested-router".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NESTED_SERVICE_NAME`: Service name (default: nested-router)
    /// - `NESTED_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `NESTED_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("NESTED_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("NESTED_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("NESTED_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [("RUST_LOG", "debug"), ("NESTED_JSON_LOGS", "1")]
            .into_iter()
            .collect();
        let config = TelemetryConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
        assert_eq!(config.service_name, "nested-router");
    }

    #[test]
    fn test_nested_level_wins_over_rust_log() {
        let vars: HashMap<&str, &str> = [("RUST_LOG", "debug"), ("NESTED_LOG_LEVEL", "warn")]
            .into_iter()
            .collect();
        let config = TelemetryConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.log_level, "warn");
    }
}
