//! Types shared by every flatline crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary health verdict pushed to the autoscaling group.
///
/// There is no "unknown" state: a node is only ever
/// observed through at least one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_healthy(healthy: bool) -> Self {
        if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }

    /// The `HealthStatus` string understood by Auto Scaling.
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
