//! The worker as a cancellable tokio task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

/// Future returned by a `WorkerFactory`.
pub type WorkerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Builds a fresh worker body each time the lock is acquired.
///
/// The receiver flips to `true` when the worker should stop; the worker
/// checks it between cycles.
pub type WorkerFactory = Arc<dyn Fn(watch::Receiver<bool>) -> WorkerFuture + Send + Sync>;

/// Wrap an async fn (or closure) as a `WorkerFactory`.
pub fn worker_factory<F, Fut>(body: F) -> WorkerFactory
where
    F: Fn(watch::Receiver<bool>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |cancel: watch::Receiver<bool>| -> WorkerFuture { Box::pin(body(cancel)) })
}

/// A running worker plus its cancellation flag.
pub struct WorkerTask {
    handle: JoinHandle<anyhow::Result<()>>,
    cancel_tx: watch::Sender<bool>,
}

impl WorkerTask {
    /// Spawn a new worker from `factory`.
    pub fn start(factory: &WorkerFactory) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(factory(cancel_rx));
        debug!("worker task started");
        Self { handle, cancel_tx }
    }

    /// `false` once the worker body has returned or panicked.
    pub fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Ask the worker to stop after its current cycle.
    pub fn request_cancel(&self) {
        // The receiver lives inside the worker; it is gone once the worker ends.
        let _ = self.cancel_tx.send(true);
    }

    /// Stops the worker at its next await point, mid-cycle if need be.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Wait for the worker to end. A panic is reported as an error.
    pub async fn join(self) -> anyhow::Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("worker task failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn until_cancelled(mut cancel: watch::Receiver<bool>) -> anyhow::Result<()> {
        let _ = cancel.wait_for(|c| *c).await;
        Ok(())
    }

    async fn failing(_cancel: watch::Receiver<bool>) -> anyhow::Result<()> {
        Err(anyhow!("query failed"))
    }

    async fn panicking(_cancel: watch::Receiver<bool>) -> anyhow::Result<()> {
        panic!("boom")
    }

    async fn stuck(_cancel: watch::Receiver<bool>) -> anyhow::Result<()> {
        std::future::pending().await
    }

    async fn immediate(_cancel: watch::Receiver<bool>) -> anyhow::Result<()> {
        Ok(())
    }

    #[tokio::test]
    async fn cancel_stops_worker() {
        let factory = worker_factory(until_cancelled);
        let task = WorkerTask::start(&factory);
        tokio::task::yield_now().await;
        assert!(task.is_alive());

        task.request_cancel();
        task.join().await.unwrap();
    }

    #[tokio::test]
    async fn finished_worker_is_not_alive() {
        let factory = worker_factory(failing);
        let task = WorkerTask::start(&factory);

        tokio::time::timeout(Duration::from_secs(5), async {
            while task.is_alive() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let err = task.join().await.unwrap_err();
        assert_eq!(err.to_string(), "query failed");
    }

    #[tokio::test]
    async fn panic_is_reported_by_join() {
        let factory = worker_factory(panicking);
        let task = WorkerTask::start(&factory);
        let err = task.join().await.unwrap_err();
        assert!(err.to_string().contains("worker task failed"));
    }

    #[tokio::test]
    async fn abort_interrupts_a_stuck_worker() {
        let factory = worker_factory(stuck);
        let task = WorkerTask::start(&factory);
        tokio::task::yield_now().await;

        task.request_cancel();
        task.abort_handle().abort();
        let err = task.join().await.unwrap_err();
        assert!(err.to_string().contains("worker task failed"));
    }

    #[tokio::test]
    async fn cancel_after_exit_is_harmless() {
        let factory = worker_factory(immediate);
        let task = WorkerTask::start(&factory);
        tokio::task::yield_now().await;
        task.request_cancel();
        task.join().await.unwrap();
    }
}
