//! Cross-bundle integration scenarios.

pub mod harness;

#[cfg(test)]
mod e2e_routing;

#[cfg(test)]
mod lifecycle;
