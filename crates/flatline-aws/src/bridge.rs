//! `InstanceHealthBridge` for EC2 Auto Scaling.

use async_trait::async_trait;
use tracing::{debug, info};

use flatline_consul::{Consul, Transport};
use flatline_core::HealthStatus;
use flatline_health::{BridgeError, BridgeResult, InstanceHealthBridge};

use crate::cloud::CloudApi;

/// Resolves nodes through the Consul catalog and instances through `C`.
pub struct AwsBridge<T, C> {
    consul: Consul<T>,
    cloud: C,
    dry_run: bool,
}

impl<T: Transport, C: CloudApi> AwsBridge<T, C> {
    pub fn new(consul: Consul<T>, cloud: C) -> Self {
        Self {
            consul,
            cloud,
            dry_run: false,
        }
    }

    /// Log instead of calling `SetInstanceHealth`.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cloud(&self) -> &C {
        &self.cloud
    }
}

#[async_trait]
impl<T: Transport, C: CloudApi> InstanceHealthBridge for AwsBridge<T, C> {
    async fn resolve_address(&self, node: &str) -> BridgeResult<Option<String>> {
        Ok(self.consul.node_address(node).await?)
    }

    async fn resolve_instance(&self, address: &str) -> BridgeResult<Option<String>> {
        let mut ids = self.cloud.instances_with_address(address).await?;
        match ids.len() {
            0 | 1 => Ok(ids.pop()),
            count => Err(BridgeError::Ambiguous {
                address: address.to_string(),
                count,
            }),
        }
    }

    async fn is_managed(&self, instance_id: &str) -> BridgeResult<bool> {
        let records = self.cloud.scaling_group_instances(instance_id).await?;
        debug!(%instance_id, records, "auto scaling membership");
        Ok(records > 0)
    }

    async fn set_health(&self, instance_id: &str, status: HealthStatus) -> BridgeResult<()> {
        if self.dry_run {
            info!(%instance_id, %status, "dry run, not setting instance health");
            return Ok(());
        }
        self.cloud.set_instance_health(instance_id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatline_consul::testing::ScriptedTransport;
    use flatline_consul::{ConsulError, ConsulResponse};
    use flatline_health::{ForwardOutcome, NodeTransition, SkipReason, forward_transition};
    use http::Method;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCloud {
        instances: HashMap<String, Vec<String>>,
        managed: HashMap<String, usize>,
        fail_updates: bool,
        updates: Mutex<Vec<(String, HealthStatus)>>,
    }

    impl FakeCloud {
        fn with_instances(mut self, address: &str, ids: &[&str]) -> Self {
            self.instances
                .insert(address.to_string(), ids.iter().map(|id| id.to_string()).collect());
            self
        }

        fn with_managed(mut self, instance_id: &str) -> Self {
            self.managed.insert(instance_id.to_string(), 1);
            self
        }

        fn updates(&self) -> Vec<(String, HealthStatus)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CloudApi for FakeCloud {
        async fn instances_with_address(&self, address: &str) -> BridgeResult<Vec<String>> {
            Ok(self.instances.get(address).cloned().unwrap_or_default())
        }

        async fn scaling_group_instances(&self, instance_id: &str) -> BridgeResult<usize> {
            Ok(self.managed.get(instance_id).copied().unwrap_or(0))
        }

        async fn set_instance_health(&self, instance_id: &str, status: HealthStatus) -> BridgeResult<()> {
            if self.fail_updates {
                return Err(BridgeError::Cloud("SetInstanceHealth: throttled".to_string()));
            }
            self.updates
                .lock()
                .unwrap()
                .push((instance_id.to_string(), status));
            Ok(())
        }
    }

    fn catalog(transport: &ScriptedTransport, node: &str, address: Option<&str>) {
        let body = match address {
            Some(address) => json!({"Node": {"Node": node, "Address": address}, "Services": {}}),
            None => json!(null),
        };
        transport.respond(
            Method::GET,
            &format!("v1/catalog/node/{node}"),
            vec![Ok(ConsulResponse::new(body))],
        );
    }

    fn bridge(transport: ScriptedTransport, cloud: FakeCloud) -> AwsBridge<ScriptedTransport, FakeCloud> {
        AwsBridge::new(Consul::new(transport), cloud)
    }

    #[tokio::test]
    async fn single_instance_resolves() {
        let cloud = FakeCloud::default().with_instances("10.0.1.123", &["i-1234"]);
        let bridge = bridge(ScriptedTransport::new(), cloud);
        assert_eq!(
            bridge.resolve_instance("10.0.1.123").await.unwrap(),
            Some("i-1234".to_string())
        );
    }

    #[tokio::test]
    async fn no_instance_is_none() {
        let bridge = bridge(ScriptedTransport::new(), FakeCloud::default());
        assert_eq!(bridge.resolve_instance("192.168.1.5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn several_instances_are_ambiguous() {
        let cloud = FakeCloud::default().with_instances("10.0.1.123", &["i-1", "i-2"]);
        let bridge = bridge(ScriptedTransport::new(), cloud);
        let err = bridge.resolve_instance("10.0.1.123").await.unwrap_err();
        assert!(matches!(err, BridgeError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn membership_decides_managed() {
        let cloud = FakeCloud::default().with_managed("i-1");
        let bridge = bridge(ScriptedTransport::new(), cloud);
        assert!(bridge.is_managed("i-1").await.unwrap());
        assert!(!bridge.is_managed("i-2").await.unwrap());
    }

    #[tokio::test]
    async fn address_comes_from_catalog() {
        let transport = ScriptedTransport::new();
        catalog(&transport, "web-1", Some("10.0.1.123"));
        catalog(&transport, "ghost", None);
        let bridge = bridge(transport, FakeCloud::default());

        assert_eq!(
            bridge.resolve_address("web-1").await.unwrap(),
            Some("10.0.1.123".to_string())
        );
        assert_eq!(bridge.resolve_address("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn catalog_failure_is_registry_error() {
        let transport = ScriptedTransport::new();
        transport.respond(
            Method::GET,
            "v1/catalog/node/web-1",
            vec![Err(ConsulError::Http("connection reset".to_string()))],
        );
        let bridge = bridge(transport, FakeCloud::default());
        let err = bridge.resolve_address("web-1").await.unwrap_err();
        assert!(matches!(err, BridgeError::Registry(ConsulError::Http(_))));
    }

    #[tokio::test]
    async fn forwards_transition_end_to_end() {
        let transport = ScriptedTransport::new();
        catalog(&transport, "web-1", Some("10.0.1.123"));
        let cloud = FakeCloud::default()
            .with_instances("10.0.1.123", &["i-1234"])
            .with_managed("i-1234");
        let bridge = bridge(transport, cloud);

        let transition = NodeTransition::new("web-1", HealthStatus::Unhealthy);
        let outcome = forward_transition(&bridge, &transition).await.unwrap();

        assert_eq!(outcome, ForwardOutcome::Updated { instance_id: "i-1234".to_string() });
        assert_eq!(
            bridge.cloud().updates(),
            vec![("i-1234".to_string(), HealthStatus::Unhealthy)]
        );
    }

    #[tokio::test]
    async fn unmanaged_instance_is_skipped() {
        let transport = ScriptedTransport::new();
        catalog(&transport, "bastion", Some("10.0.0.5"));
        let cloud = FakeCloud::default().with_instances("10.0.0.5", &["i-9999"]);
        let bridge = bridge(transport, cloud);

        let transition = NodeTransition::new("bastion", HealthStatus::Unhealthy);
        let outcome = forward_transition(&bridge, &transition).await.unwrap();

        assert_eq!(
            outcome,
            ForwardOutcome::Skipped(SkipReason::NotManaged { instance_id: "i-9999".to_string() })
        );
        assert!(bridge.cloud().updates().is_empty());
    }

    #[tokio::test]
    async fn dry_run_skips_update() {
        let cloud = FakeCloud::default();
        let bridge = bridge(ScriptedTransport::new(), cloud).with_dry_run(true);

        bridge.set_health("i-1234", HealthStatus::Healthy).await.unwrap();
        assert!(bridge.cloud().updates().is_empty());
    }

    #[tokio::test]
    async fn update_failure_surfaces() {
        let cloud = FakeCloud {
            fail_updates: true,
            ..FakeCloud::default()
        };
        let bridge = bridge(ScriptedTransport::new(), cloud);
        let err = bridge.set_health("i-1234", HealthStatus::Healthy).await.unwrap_err();
        assert!(matches!(err, BridgeError::Cloud(_)));
    }
}
