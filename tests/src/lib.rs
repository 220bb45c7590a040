//! # Nested Router Test Suite
//!
//! Cross-crate scenarios: several bundles, each with its own internal bus
//! and router, sharing one external bus in-process.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs      # Bundles wired through MemoryConnector
//!     ├── e2e_routing.rs  # Anycast / unicast request-reply across bundles
//!     └── lifecycle.rs    # Backpressure, failures, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p nested-tests
//! cargo test -p nested-tests integration::e2e_routing::
//! ```

#![allow(dead_code)]

pub mod integration;
