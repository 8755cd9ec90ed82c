//! In-memory bridge for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use flatline_core::HealthStatus;

use crate::bridge::{BridgeError, BridgeResult, InstanceHealthBridge};

#[derive(Default)]
pub struct RecordingBridge {
    addresses: HashMap<String, String>,
    instances: HashMap<String, String>,
    ambiguous: HashMap<String, usize>,
    managed: HashSet<String>,
    failing_set: HashSet<String>,
    calls: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, HealthStatus)>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, node: &str, address: &str) -> Self {
        self.addresses.insert(node.to_string(), address.to_string());
        self
    }

    pub fn with_instance(mut self, node: &str, address: &str, instance_id: &str, managed: bool) -> Self {
        self.addresses.insert(node.to_string(), address.to_string());
        self.instances.insert(address.to_string(), instance_id.to_string());
        if managed {
            self.managed.insert(instance_id.to_string());
        }
        self
    }

    pub fn with_ambiguous(mut self, address: &str, count: usize) -> Self {
        self.ambiguous.insert(address.to_string(), count);
        self
    }

    /// Make `set_health` fail for this instance.
    pub fn with_failing_update(mut self, instance_id: &str) -> Self {
        self.failing_set.insert(instance_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, HealthStatus)> {
        self.updates.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl InstanceHealthBridge for RecordingBridge {
    async fn resolve_address(&self, node: &str) -> BridgeResult<Option<String>> {
        self.record(format!("resolve_address {node}"));
        Ok(self.addresses.get(node).cloned())
    }

    async fn resolve_instance(&self, address: &str) -> BridgeResult<Option<String>> {
        self.record(format!("resolve_instance {address}"));
        if let Some(count) = self.ambiguous.get(address) {
            return Err(BridgeError::Ambiguous {
                address: address.to_string(),
                count: *count,
            });
        }
        Ok(self.instances.get(address).cloned())
    }

    async fn is_managed(&self, instance_id: &str) -> BridgeResult<bool> {
        self.record(format!("is_managed {instance_id}"));
        Ok(self.managed.contains(instance_id))
    }

    async fn set_health(&self, instance_id: &str, status: HealthStatus) -> BridgeResult<()> {
        self.record(format!("set_health {instance_id} {status}"));
        if self.failing_set.contains(instance_id) {
            return Err(BridgeError::Cloud("throttled".to_string()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((instance_id.to_string(), status));
        Ok(())
    }
}
