//! Domain types: addresses, prefixes, errors, and the failure marker.

pub mod address;
pub mod errors;
pub mod failure;

pub use address::{BundleAddress, Prefixes, ROUTER_NAMESPACE};
pub use errors::RouterError;
pub use failure::{FailureKind, RouteFailure};
