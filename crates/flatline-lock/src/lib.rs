//! flatline-lock: at most one active worker per lock key.
//!
//! # State machine
//!
//! ```text
//!             create session (fatal on failure)
//!                        │
//!                        ▼
//!   ┌──────────────▶ Acquiring ── acquire=<session> until true
//!   │                    │
//!   │                    ▼
//!   │                 Holding ── every check interval:
//!   │                    │         read lock key, then worker liveness
//!   │        ┌───────────┴──────────────┐
//!   │        ▼                          ▼
//!   │   WorkerDied                Lost / TransportFailed
//!   │   release lock              cancel worker, wait for it
//!   └────────┴──────────────────────────┘
//! ```
//!
//! Shutdown is honored in every state: the worker is cancelled and
//! awaited, the lock released, and the session destroyed.

pub mod error;
pub mod supervisor;
pub mod task;

pub use error::{LockError, LockResult};
pub use supervisor::{LockSupervisor, SupervisionOutcome};
pub use task::{WorkerFactory, WorkerFuture, WorkerTask, worker_factory};
