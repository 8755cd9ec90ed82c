//! Lock supervisor: acquires the leader lock and keeps the worker honest.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use flatline_consul::{Consul, LockStatus, SessionId, Transport};

use crate::error::{LockError, LockResult};
use crate::task::{WorkerFactory, WorkerTask};

/// Result of one supervision check while holding the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// Lock still ours, worker still running.
    Holding,
    /// The lock key is empty or names another session.
    Lost,
    /// The worker ended while we still held the lock.
    WorkerDied,
    /// The lock could not be read. Handled like `Lost`.
    TransportFailed,
}

/// How a holding period ended.
enum HoldExit {
    Outcome(SupervisionOutcome),
    Shutdown,
}

/// Runs the worker only while this process holds the lock key.
pub struct LockSupervisor<T> {
    consul: Consul<T>,
    key: String,
    session_name: String,
    acquire_delay: Duration,
    check_interval: Duration,
}

impl<T: Transport> LockSupervisor<T> {
    /// Create a supervisor for `key`. Sessions it creates are named `session_name`.
    pub fn new(consul: Consul<T>, key: impl Into<String>, session_name: impl Into<String>) -> Self {
        Self {
            consul,
            key: key.into(),
            session_name: session_name.into(),
            acquire_delay: Duration::from_secs(5),
            check_interval: Duration::from_secs(5),
        }
    }

    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// The KV key used as the lock.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run until `shutdown` flips to `true`.
    ///
    /// Only a failure to create the initial session is returned as an
    /// error; everything after that is logged and retried.
    pub async fn run(
        &self,
        factory: WorkerFactory,
        mut shutdown: watch::Receiver<bool>,
    ) -> LockResult<()> {
        let mut session = self
            .consul
            .create_session(&self.session_name)
            .await
            .map_err(LockError::Session)?;
        info!(%session, key = %self.key, "lock supervisor started");

        loop {
            if !self.acquire(&mut session, &mut shutdown).await {
                break;
            }
            info!(%session, key = %self.key, "lock acquired, starting worker");

            let worker = WorkerTask::start(&factory);
            match self.hold(&session, &worker, &mut shutdown).await {
                HoldExit::Outcome(SupervisionOutcome::WorkerDied) => {
                    match worker.join().await {
                        Ok(()) => warn!("worker exited while holding the lock"),
                        Err(e) => error!(error = %e, "worker died while holding the lock"),
                    }
                    self.release(&session).await;
                }
                HoldExit::Outcome(outcome) => {
                    warn!(?outcome, "lock no longer held, stopping worker");
                    worker.request_cancel();
                    if !join_or_shutdown(worker, &mut shutdown).await {
                        break;
                    }
                }
                HoldExit::Shutdown => {
                    info!("shutdown requested, stopping worker");
                    worker.request_cancel();
                    log_worker_exit(worker.join().await);
                    self.release(&session).await;
                    break;
                }
            }
        }

        match self.consul.destroy_session(&session).await {
            Ok(_) => debug!(%session, "session destroyed"),
            Err(e) => warn!(%session, error = %e, "failed to destroy session"),
        }
        info!(key = %self.key, "lock supervisor stopped");
        Ok(())
    }

    /// Try to take the lock until it is granted. Returns `false` on shutdown.
    ///
    /// If Consul rejects an attempt because the session was invalidated
    /// server-side, a new session replaces `session` and the old one is
    /// destroyed. Any other rejection is logged and retried as is.
    pub async fn acquire(
        &self,
        session: &mut SessionId,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                return false;
            }

            match self.consul.acquire_lock(&self.key, session).await {
                Ok(true) => return true,
                Ok(false) => debug!(key = %self.key, "lock held elsewhere"),
                Err(e) if e.is_invalid_session() => {
                    warn!(key = %self.key, %session, error = %e, "session invalidated, recreating");
                    self.replace_session(session).await;
                }
                Err(e) => warn!(key = %self.key, %session, error = %e, "acquire attempt failed"),
            }

            if wait_or_shutdown(self.acquire_delay, shutdown).await {
                return false;
            }
        }
    }

    /// Swap in a fresh session. On failure the old one is kept for the next attempt.
    async fn replace_session(&self, session: &mut SessionId) {
        let fresh = match self.consul.create_session(&self.session_name).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "failed to recreate session");
                return;
            }
        };
        if let Err(e) = self.consul.destroy_session(session).await {
            debug!(old = %session, error = %e, "failed to destroy old session");
        }
        info!(old = %session, new = %fresh, "session recreated");
        *session = fresh;
    }

    /// Read the lock key, then look at the worker.
    ///
    /// The read is bounded by the check interval, so a hung agent shows up
    /// as `TransportFailed` instead of stalling supervision.
    pub async fn supervise_once(&self, session: &SessionId, worker: &WorkerTask) -> SupervisionOutcome {
        let check = self.consul.check_lock(&self.key, session);
        match tokio::time::timeout(self.check_interval, check).await {
            Ok(Ok(LockStatus::Held)) => {}
            Ok(Ok(LockStatus::Free)) => {
                warn!(key = %self.key, "lock key has no holder");
                return SupervisionOutcome::Lost;
            }
            Ok(Ok(LockStatus::HeldByOther(holder))) => {
                warn!(key = %self.key, %holder, "lock taken by another session");
                return SupervisionOutcome::Lost;
            }
            Ok(Err(e)) => {
                warn!(key = %self.key, error = %e, "lock check failed");
                return SupervisionOutcome::TransportFailed;
            }
            Err(_) => {
                warn!(key = %self.key, timeout = ?self.check_interval, "lock check timed out");
                return SupervisionOutcome::TransportFailed;
            }
        }

        if worker.is_alive() {
            SupervisionOutcome::Holding
        } else {
            SupervisionOutcome::WorkerDied
        }
    }

    async fn hold(
        &self,
        session: &SessionId,
        worker: &WorkerTask,
        shutdown: &mut watch::Receiver<bool>,
    ) -> HoldExit {
        loop {
            if wait_or_shutdown(self.check_interval, shutdown).await {
                return HoldExit::Shutdown;
            }
            match self.supervise_once(session, worker).await {
                SupervisionOutcome::Holding => debug!(key = %self.key, "lock held, worker alive"),
                outcome => return HoldExit::Outcome(outcome),
            }
        }
    }

    async fn release(&self, session: &SessionId) {
        match self.consul.release_lock(&self.key, session).await {
            Ok(released) => info!(key = %self.key, released, "lock released"),
            Err(e) => warn!(key = %self.key, error = %e, "failed to release lock"),
        }
    }
}

fn log_worker_exit(result: anyhow::Result<()>) {
    match result {
        Ok(()) => debug!("worker stopped"),
        Err(e) => warn!(error = %e, "worker stopped with an error"),
    }
}

/// Wait for a cancelled worker to end. Returns `false` if shutdown came first,
/// in which case the worker is aborted.
async fn join_or_shutdown(worker: WorkerTask, shutdown: &mut watch::Receiver<bool>) -> bool {
    let abort = worker.abort_handle();
    tokio::select! {
        result = worker.join() => {
            log_worker_exit(result);
            true
        }
        () = shutdown_requested(shutdown) => {
            info!("shutdown requested while stopping worker, aborting it");
            abort.abort();
            false
        }
    }
}

/// Resolves once shutdown is requested or its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stopping = *shutdown.borrow();
        if stopping || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay`. Returns `true` if shutdown was requested meanwhile.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let stopping = *shutdown.borrow();
    if stopping {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
