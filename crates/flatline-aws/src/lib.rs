//! flatline-aws: pushes node health into EC2 Auto Scaling.
//!
//! ```text
//! node name ──catalog──▶ private address ──DescribeInstances──▶ instance id
//!                                                                   │
//!               SetInstanceHealth ◀── DescribeAutoScalingInstances ─┘
//! ```
//!
//! The node → address step goes through Consul; the rest goes through a
//! `CloudApi`, which is the AWS SDK in production.

pub mod bridge;
pub mod cloud;

pub use bridge::AwsBridge;
pub use cloud::{CloudApi, SdkCloud};
