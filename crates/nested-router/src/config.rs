//! # Router Configuration
//!
//! Loaded from a TOML file, then overridden by environment variables.
//!
//! ## Config File Format
//!
//! ```toml
//! bundle_id = "NESTED-000"
//!
//! [job]
//! int_address = "mem://internal"
//! ext_address = "mem://cluster"
//! int_workers_count = 10
//! ext_workers_count = 10
//! int_buffer_size = 100
//! ext_buffer_size = 100
//! request_timeout_secs = 20
//!
//! [log]
//! level = "info"
//! json = false
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BUNDLE_ID` | `bundle_id` |
//! | `JOB_INT_ADDRESS` / `JOB_EXT_ADDRESS` | `job.int_address` / `job.ext_address` |
//! | `JOB_INT_WORKERS_COUNT` / `JOB_EXT_WORKERS_COUNT` | pool sizes |
//! | `JOB_INT_BUFFER_SIZE` / `JOB_EXT_BUFFER_SIZE` | queue capacities |
//! | `JOB_REQUEST_TIMEOUT_SECS` | `job.request_timeout_secs` |
//! | `NESTED_LOG_LEVEL` or `RUST_LOG` | `log.level` |
//! | `NESTED_JSON_LOGS` | `log.json` |

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{BundleAddress, RouterError};
use crate::service::worker::WorkerSettings;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nested.toml";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    /// Neither the file nor the environment provided `BUNDLE_ID`.
    #[error("BUNDLE_ID is not set")]
    MissingBundleId,
}

/// Complete router configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// `<GROUP>-<INDEX>` of the bundle this router serves.
    pub bundle_id: Option<String>,
    /// Bus connections and worker pools.
    pub job: JobConfig,
    /// Logging.
    pub log: LogConfig,
}

/// Bus connections and worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Connection string of the internal bus.
    pub int_address: String,
    /// Connection string of the external bus.
    pub ext_address: String,
    /// Workers draining the internal→external queue.
    pub int_workers_count: usize,
    /// Workers draining the external→internal queue.
    pub ext_workers_count: usize,
    /// Capacity of the internal→external queue.
    pub int_buffer_size: usize,
    /// Capacity of the external→internal queue.
    pub ext_buffer_size: usize,
    /// Bound on each cross-bus request.
    pub request_timeout_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            int_address: "mem://internal".to_string(),
            ext_address: "mem://external".to_string(),
            int_workers_count: 10,
            ext_workers_count: 10,
            int_buffer_size: 100,
            ext_buffer_size: 100,
            request_timeout_secs: 20,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive.
    pub level: String,
    /// Emit JSON lines.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; environment overrides are applied
    /// separately with [`apply_env`](Self::apply_env).
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                info!(path = %path.display(), "Loaded router configuration");
                Self::parse(&content)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                error: e.to_string(),
            }),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_lookup(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_lookup(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(bundle_id) = lookup("BUNDLE_ID") {
            self.bundle_id = Some(bundle_id);
        }
        if let Some(address) = lookup("JOB_INT_ADDRESS") {
            self.job.int_address = address;
        }
        if let Some(address) = lookup("JOB_EXT_ADDRESS") {
            self.job.ext_address = address;
        }

        let numbers: [(&'static str, &mut usize); 4] = [
            ("JOB_INT_WORKERS_COUNT", &mut self.job.int_workers_count),
            ("JOB_EXT_WORKERS_COUNT", &mut self.job.ext_workers_count),
            ("JOB_INT_BUFFER_SIZE", &mut self.job.int_buffer_size),
            ("JOB_EXT_BUFFER_SIZE", &mut self.job.ext_buffer_size),
        ];
        for (key, field) in numbers {
            if let Some(value) = lookup(key) {
                *field = parse_value(key, &value)?;
            }
        }
        if let Some(value) = lookup("JOB_REQUEST_TIMEOUT_SECS") {
            self.job.request_timeout_secs = parse_value("JOB_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(level) = lookup("NESTED_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            self.log.level = level;
        }
        if let Some(value) = lookup("NESTED_JSON_LOGS") {
            self.log.json = value.to_lowercase() == "true" || value == "1";
        }
        Ok(())
    }

    /// The configured bundle address.
    ///
    /// # Errors
    ///
    /// `Config(MissingBundleId)` when unset, `InvalidBundleId` when malformed.
    pub fn bundle_address(&self) -> Result<BundleAddress, RouterError> {
        let raw = self
            .bundle_id
            .as_deref()
            .ok_or(ConfigError::MissingBundleId)?;
        BundleAddress::parse(raw)
    }

    /// Bound on each cross-bus request.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.job.request_timeout_secs)
    }

    /// Check everything startup depends on.
    pub fn validate(&self) -> Result<(), RouterError> {
        self.bundle_address()?;
        WorkerSettings::from_config(self).validate()
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}
