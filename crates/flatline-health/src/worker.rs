//! Health worker: the poll loop run while this process holds the lock.
//!
//! Each cycle is one blocking query, one diff, and one bridge call chain
//! per transition. Cancellation is checked only at the top of a cycle, so
//! an in-flight query is always allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use flatline_consul::{Consul, Cursor, Transport};

use crate::bridge::{ForwardOutcome, InstanceHealthBridge, forward_transition};
use crate::differ::diff;
use crate::error::WorkerError;
use crate::model::{Check, NodeTransition, Snapshot};

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub transitions: Vec<NodeTransition>,
    pub vanished: Vec<String>,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Mirrors Consul node health into the autoscaling group.
pub struct HealthWorker<T> {
    consul: Consul<T>,
    bridge: Arc<dyn InstanceHealthBridge>,
    wait: Duration,
    snapshot: Snapshot,
    cursor: Option<Cursor>,
}

impl<T: Transport> HealthWorker<T> {
    /// Create a worker with an empty snapshot and no cursor.
    pub fn new(consul: Consul<T>, bridge: Arc<dyn InstanceHealthBridge>, wait: Duration) -> Self {
        Self {
            consul,
            bridge,
            wait,
            snapshot: Snapshot::new(),
            cursor: None,
        }
    }

    /// Node health as of the last completed cycle.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The index the next blocking query will wait on.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Poll until cancelled or a query fails.
    pub async fn run(mut self, cancel: watch::Receiver<bool>) -> Result<(), WorkerError> {
        info!(wait = ?self.wait, "health worker started");

        loop {
            let cancelled = *cancel.borrow();
            if cancelled {
                info!(nodes = self.snapshot.len(), "health worker cancelled");
                return Ok(());
            }

            if let Err(e) = self.poll_once().await {
                error!(error = %e, "health worker stopping");
                return Err(e);
            }
        }
    }

    /// One query → diff → forward cycle.
    pub async fn poll_once(&mut self) -> Result<CycleReport, WorkerError> {
        debug!(cursor = ?self.cursor, "querying consul for health checks");
        let query = self
            .consul
            .health_state(self.cursor.as_ref(), self.wait)
            .await?;

        if query.cursor.is_some() && query.cursor == self.cursor {
            debug!(cursor = ?query.cursor, "blocking query returned without a new index");
        }
        self.cursor = query.cursor;

        let checks = query.checks.into_iter().map(Check::from);
        let diff = diff(&self.snapshot, checks);
        self.snapshot = diff.snapshot;

        for node in &diff.vanished {
            info!(%node, "node no longer reported, dropped from snapshot");
        }

        let mut report = CycleReport {
            transitions: diff.transitions,
            vanished: diff.vanished,
            ..CycleReport::default()
        };

        for transition in &report.transitions {
            info!(node = %transition.node, status = %transition.status, "node health changed");
            match forward_transition(self.bridge.as_ref(), transition).await {
                Ok(ForwardOutcome::Updated { .. }) => report.updated += 1,
                Ok(ForwardOutcome::Skipped(reason)) => {
                    debug!(node = %transition.node, ?reason, "transition not forwarded");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(node = %transition.node, error = %e, "failed to update instance health");
                    report.failed += 1;
                }
            }
        }

        debug!(
            nodes = self.snapshot.len(),
            transitions = report.transitions.len(),
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "poll cycle complete"
        );
        Ok(report)
    }
}
