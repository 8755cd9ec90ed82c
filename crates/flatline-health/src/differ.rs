//! Snapshot differ: checks in, per-node transitions out.
//!
//! ```text
//! checks ──group by node──▶ nodes ──drop maintenance──▶ snapshot
//!                                                        │
//! previous snapshot ─────────── compare `healthy` ───────┴──▶ transitions
//! ```
//!
//! A node is a transition when it is new or its health flipped. Nodes that
//! drop out of the snapshot (deregistered, no checks left, or put into
//! maintenance) are reported in `vanished` and never forwarded; if they
//! come back they count as new.

use std::collections::BTreeMap;

use crate::model::{Check, Node, NodeTransition, Snapshot};

/// Output of one diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub snapshot: Snapshot,
    /// Sorted by node name.
    pub transitions: Vec<NodeTransition>,
    /// Nodes in the previous snapshot that are gone from the new one, sorted.
    pub vanished: Vec<String>,
}

/// Group checks by node, keeping every check of each node.
pub fn group_checks(checks: impl IntoIterator<Item = Check>) -> BTreeMap<String, Vec<Check>> {
    let mut groups: BTreeMap<String, Vec<Check>> = BTreeMap::new();
    for check in checks {
        groups.entry(check.node.clone()).or_default().push(check);
    }
    groups
}

/// Build the active node set, excluding nodes in maintenance.
pub fn build_snapshot(checks: impl IntoIterator<Item = Check>) -> Snapshot {
    group_checks(checks)
        .into_iter()
        .map(|(name, checks)| Node::new(name, checks))
        .filter(|node| !node.maintenance())
        .collect()
}

/// Compare `checks` against `previous`.
pub fn diff(previous: &Snapshot, checks: impl IntoIterator<Item = Check>) -> Diff {
    let snapshot = build_snapshot(checks);

    let mut transitions: Vec<NodeTransition> = snapshot
        .nodes()
        .filter(|node| match previous.get(&node.name) {
            None => true,
            Some(prev) => prev.healthy() != node.healthy(),
        })
        .map(|node| NodeTransition::new(node.name.clone(), node.status()))
        .collect();
    transitions.sort_by(|a, b| a.node.cmp(&b.node));

    let mut vanished: Vec<String> = previous
        .nodes()
        .filter(|node| !snapshot.contains(&node.name))
        .map(|node| node.name.clone())
        .collect();
    vanished.sort();

    Diff {
        snapshot,
        transitions,
        vanished,
    }
}
