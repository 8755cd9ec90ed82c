use flatline_consul::ConsulError;
use thiserror::Error;

pub type LockResult<T> = Result<T, LockError>;

/// Errors that stop the supervisor.
///
/// Losing the lock or the worker is not an error; see `SupervisionOutcome`.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to create consul session: {0}")]
    Session(#[source] ConsulError),
}
