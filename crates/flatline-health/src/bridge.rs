//! The boundary to the compute side: node → address → instance → health.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use flatline_consul::ConsulError;
use flatline_core::HealthStatus;

use crate::model::NodeTransition;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures while forwarding one transition.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("registry lookup failed: {0}")]
    Registry(#[from] ConsulError),

    /// More than one instance claims the address. A configuration problem,
    /// never treated as "not found".
    #[error("{count} instances match address {address}")]
    Ambiguous { address: String, count: usize },

    #[error("cloud api error: {0}")]
    Cloud(String),
}

/// What the compute side has to offer.
///
/// `None` / `false` answers mean "outside the autoscaling group" and are
/// not errors.
#[async_trait]
pub trait InstanceHealthBridge: Send + Sync {
    async fn resolve_address(&self, node: &str) -> BridgeResult<Option<String>>;

    async fn resolve_instance(&self, address: &str) -> BridgeResult<Option<String>>;

    async fn is_managed(&self, instance_id: &str) -> BridgeResult<bool>;

    async fn set_health(&self, instance_id: &str, status: HealthStatus) -> BridgeResult<()>;
}

/// Why a transition was not pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoAddress,
    NoInstance { address: String },
    NotManaged { instance_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Updated { instance_id: String },
    Skipped(SkipReason),
}

/// Push one transition through the bridge, resolving step by step.
pub async fn forward_transition<B>(
    bridge: &B,
    transition: &NodeTransition,
) -> BridgeResult<ForwardOutcome>
where
    B: InstanceHealthBridge + ?Sized,
{
    let node = transition.node.as_str();

    let Some(address) = bridge.resolve_address(node).await? else {
        debug!(%node, "node has no address, skipping");
        return Ok(ForwardOutcome::Skipped(SkipReason::NoAddress));
    };

    let Some(instance_id) = bridge.resolve_instance(&address).await? else {
        debug!(%node, %address, "no instance at address, skipping");
        return Ok(ForwardOutcome::Skipped(SkipReason::NoInstance { address }));
    };

    if !bridge.is_managed(&instance_id).await? {
        debug!(%node, %instance_id, "instance not in an autoscaling group, skipping");
        return Ok(ForwardOutcome::Skipped(SkipReason::NotManaged { instance_id }));
    }

    bridge.set_health(&instance_id, transition.status).await?;
    info!(%node, %instance_id, status = %transition.status, "instance health updated");
    Ok(ForwardOutcome::Updated { instance_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBridge;

    fn unhealthy(node: &str) -> NodeTransition {
        NodeTransition::new(node, HealthStatus::Unhealthy)
    }

    #[tokio::test]
    async fn forwards_managed_instance() {
        let bridge = RecordingBridge::new().with_instance("web-1", "10.0.1.123", "i-1234", true);

        let outcome = forward_transition(&bridge, &unhealthy("web-1")).await.unwrap();

        assert_eq!(
            outcome,
            ForwardOutcome::Updated { instance_id: "i-1234".to_string() }
        );
        assert_eq!(
            bridge.updates(),
            vec![("i-1234".to_string(), HealthStatus::Unhealthy)]
        );
        assert_eq!(
            bridge.calls(),
            vec![
                "resolve_address web-1",
                "resolve_instance 10.0.1.123",
                "is_managed i-1234",
                "set_health i-1234 Unhealthy",
            ]
        );
    }

    #[tokio::test]
    async fn skips_unknown_node() {
        let bridge = RecordingBridge::new();
        let outcome = forward_transition(&bridge, &unhealthy("ghost")).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Skipped(SkipReason::NoAddress));
        assert_eq!(bridge.calls(), vec!["resolve_address ghost"]);
    }

    #[tokio::test]
    async fn skips_address_without_instance() {
        let bridge = RecordingBridge::new().with_address("laptop", "192.168.1.5");
        let outcome = forward_transition(&bridge, &unhealthy("laptop")).await.unwrap();
        assert_eq!(
            outcome,
            ForwardOutcome::Skipped(SkipReason::NoInstance { address: "192.168.1.5".to_string() })
        );
        assert!(bridge.updates().is_empty());
    }

    #[tokio::test]
    async fn skips_unmanaged_instance() {
        let bridge = RecordingBridge::new().with_instance("bastion", "10.0.0.5", "i-9999", false);
        let outcome = forward_transition(&bridge, &unhealthy("bastion")).await.unwrap();
        assert_eq!(
            outcome,
            ForwardOutcome::Skipped(SkipReason::NotManaged { instance_id: "i-9999".to_string() })
        );
        assert!(bridge.updates().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_instance_is_an_error() {
        let bridge = RecordingBridge::new()
            .with_address("web-1", "10.0.1.123")
            .with_ambiguous("10.0.1.123", 2);

        let err = forward_transition(&bridge, &unhealthy("web-1")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Ambiguous { count: 2, .. }));
        assert!(bridge.updates().is_empty());
    }
}
