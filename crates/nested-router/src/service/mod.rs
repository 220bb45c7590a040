//! # Router Service
//!
//! - `pool`: supervised worker pools draining one bounded queue each
//! - `bridge`: one routing direction (guard, rewrite, request, reply)
//! - `worker`: the Router Worker composing two bridges and two pools

pub mod bridge;
pub mod pool;
pub mod worker;

pub use bridge::{Bridge, Outcome};
pub use pool::{EnvelopeHandler, WorkerPool};
pub use worker::{RouterWorker, WorkerSettings, WorkerState};
