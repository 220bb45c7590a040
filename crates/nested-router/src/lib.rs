//! # Nested Router - Inter-Bundle Message Routing
//!
//! Bridges a bundle's internal bus with the cluster's external bus and adds
//! two addressing modes on top of plain subjects:
//!
//! - **Anycast** (`<GROUP>.<subject>`): any one instance of a bundle group
//! - **Unicast** (`<GROUP>-<INDEX>.<subject>`): exactly one bundle instance
//!
//! ## Routing Flow
//!
//! ```text
//!  POUYAN-0001 internal bus          external bus          EHSAN-0001 internal bus
//!  ROUTER.EHSAN.HELLO ──to_extern──→ EHSAN.HELLO ──to_intern──→ HELLO
//!        ▲                                                        │
//!        └──────────────── reply (same path, reversed) ───────────┘
//! ```
//!
//! ## Crate Layout
//!
//! - `domain`: bundle addresses, prefixes, errors, failure marker
//! - `service`: worker pools, bridges, and the Router Worker
//! - `job`: composition root owning both bus connections
//! - `client`: envelope addressing for application services
//! - `config`: TOML file plus environment overrides

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod client;
pub mod config;
pub mod domain;
pub mod job;
pub mod service;

pub use client::{ClientError, RouterClient};
pub use config::{ConfigError, JobConfig, LogConfig, RouterConfig, DEFAULT_CONFIG_PATH};
pub use domain::{
    BundleAddress, FailureKind, Prefixes, RouteFailure, RouterError, ROUTER_NAMESPACE,
};
pub use job::JobHandler;
pub use service::{Outcome, RouterWorker, WorkerSettings, WorkerState};
