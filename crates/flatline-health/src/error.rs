//! Worker error types.

use thiserror::Error;

/// Errors that end a worker run.
///
/// Per-transition bridge failures are not here: they are logged and the
/// cycle moves on to the next node.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("health query failed: {0}")]
    Query(#[from] flatline_consul::ConsulError),
}
