//! flatline-health: turns Consul checks into autoscaling health updates.
//!
//! # Architecture
//!
//! ```text
//! HealthWorker (one per held lock)
//!   ├── Consul::health_state(cursor)   blocking query, full check list
//!   ├── differ::diff(snapshot, checks) → transitions
//!   └── bridge::forward_transition()   node → address → instance → ASG
//! ```
//!
//! The worker owns the snapshot and the cursor. Both start empty, so a
//! fresh worker reports every node it sees once.

pub mod bridge;
pub mod differ;
pub mod error;
pub mod model;
pub mod worker;

#[cfg(test)]
mod testing;

pub use bridge::{
    BridgeError, BridgeResult, ForwardOutcome, InstanceHealthBridge, SkipReason, forward_transition,
};
pub use differ::{Diff, diff};
pub use error::WorkerError;
pub use model::{Check, Node, NodeTransition, Snapshot};
pub use worker::{CycleReport, HealthWorker};
