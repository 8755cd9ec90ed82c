//! Wire types for the Consul endpoints flatline uses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Header carrying the blocking-query index.
pub const CONSUL_INDEX_HEADER: &str = "X-Consul-Index";

/// Check ID Consul reports for a node in maintenance mode.
pub const NODE_MAINTENANCE_CHECK: &str = "_node_maintenance";

/// Opaque change cursor (the `X-Consul-Index` value).
///
/// Passed back verbatim on the next blocking query; never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a Consul session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of `GET /v1/health/state/any`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "Node")]
    pub node: String,
    #[serde(rename = "CheckID")]
    pub check_id: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl HealthCheck {
    pub fn is_passing(&self) -> bool {
        self.status == "passing"
    }
}

/// One entry of `GET /v1/kv/<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KvEntry {
    /// Holder of the lock; absent when the key is not locked.
    #[serde(rename = "Session", default)]
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionCreated {
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogNode {
    #[serde(rename = "Node")]
    pub node: Option<CatalogNodeInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogNodeInfo {
    #[serde(rename = "Address")]
    pub address: String,
}
