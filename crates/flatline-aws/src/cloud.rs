//! The AWS calls flatline makes, behind a trait so the bridge logic can be
//! tested without an account.

use async_trait::async_trait;
use aws_sdk_autoscaling::Client as AutoScalingClient;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use tracing::debug;

use flatline_core::HealthStatus;
use flatline_health::{BridgeError, BridgeResult};

#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Ids of every instance whose private address is `address`.
    async fn instances_with_address(&self, address: &str) -> BridgeResult<Vec<String>>;

    /// Number of Auto Scaling records for the instance; zero when unmanaged.
    async fn scaling_group_instances(&self, instance_id: &str) -> BridgeResult<usize>;

    async fn set_instance_health(&self, instance_id: &str, status: HealthStatus) -> BridgeResult<()>;
}

/// `CloudApi` over the AWS SDK clients.
#[derive(Clone)]
pub struct SdkCloud {
    ec2: Ec2Client,
    autoscaling: AutoScalingClient,
}

impl SdkCloud {
    /// Wrap already-configured SDK clients.
    pub fn new(ec2: Ec2Client, autoscaling: AutoScalingClient) -> Self {
        Self { ec2, autoscaling }
    }

    /// Build clients from the standard AWS environment chain. `region`
    /// overrides whatever the chain resolves.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        debug!(region = ?config.region(), "aws clients configured");
        Self::new(Ec2Client::new(&config), AutoScalingClient::new(&config))
    }
}

#[async_trait]
impl CloudApi for SdkCloud {
    async fn instances_with_address(&self, address: &str) -> BridgeResult<Vec<String>> {
        let filter = Filter::builder()
            .name("private-ip-address")
            .values(address)
            .build();
        let output = self
            .ec2
            .describe_instances()
            .filters(filter)
            .send()
            .await
            .map_err(|e| cloud_error("DescribeInstances", e))?;

        Ok(output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .filter_map(|instance| instance.instance_id())
            .map(str::to_string)
            .collect())
    }

    async fn scaling_group_instances(&self, instance_id: &str) -> BridgeResult<usize> {
        let output = self
            .autoscaling
            .describe_auto_scaling_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| cloud_error("DescribeAutoScalingInstances", e))?;
        Ok(output.auto_scaling_instances().len())
    }

    async fn set_instance_health(&self, instance_id: &str, status: HealthStatus) -> BridgeResult<()> {
        self.autoscaling
            .set_instance_health()
            .instance_id(instance_id)
            .health_status(status.as_str())
            .send()
            .await
            .map_err(|e| cloud_error("SetInstanceHealth", e))?;
        Ok(())
    }
}

fn cloud_error<E: std::error::Error>(operation: &str, err: E) -> BridgeError {
    BridgeError::Cloud(format!("{operation}: {}", DisplayErrorContext(err)))
}
