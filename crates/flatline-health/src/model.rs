//! Checks, nodes, and snapshots.

use std::collections::HashMap;

use flatline_consul::HealthCheck;
use flatline_consul::types::NODE_MAINTENANCE_CHECK;
use flatline_core::HealthStatus;

/// One health probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub node: String,
    pub id: String,
    pub passing: bool,
}

impl Check {
    pub fn new(node: impl Into<String>, id: impl Into<String>, passing: bool) -> Self {
        Self {
            node: node.into(),
            id: id.into(),
            passing,
        }
    }
}

impl From<HealthCheck> for Check {
    fn from(check: HealthCheck) -> Self {
        let passing = check.is_passing();
        Self {
            node: check.node,
            id: check.check_id,
            passing,
        }
    }
}

/// All checks currently reported for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub checks: Vec<Check>,
}

impl Node {
    pub fn new(name: impl Into<String>, checks: Vec<Check>) -> Self {
        Self {
            name: name.into(),
            checks,
        }
    }

    /// Every check passing.
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|c| c.passing)
    }

    /// An operator put the node into maintenance mode.
    pub fn maintenance(&self) -> bool {
        self.checks.iter().any(|c| c.id == NODE_MAINTENANCE_CHECK)
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus::from_healthy(self.healthy())
    }
}

/// The world as of the last successful poll: node name → node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    nodes: HashMap<String, Node>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

impl FromIterator<Node> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|n| (n.name.clone(), n)).collect(),
        }
    }
}

/// A node whose health changed (or was seen for the first time).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeTransition {
    pub node: String,
    pub status: HealthStatus,
}

impl NodeTransition {
    pub fn new(node: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            node: node.into(),
            status,
        }
    }
}
