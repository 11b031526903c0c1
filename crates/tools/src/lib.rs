//! The CloudPilot tool catalog.
//!
//! Tools give the agent bounded, read-mostly access to the AWS control
//! plane: storage and compute inventory, container and pipeline state,
//! SSM configuration, and the internal documentation index. The only
//! write (`put_ssm_parameter`) is gated by an [`ApprovalPolicy`].

pub mod compute;
pub mod containers;
pub mod docs;
pub mod parameters;
pub mod pipeline;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

use cloudpilot_config::AppConfig;
use cloudpilot_core::{CloudApi, Retriever, ToolRegistry};
use cloudpilot_security::{ApprovalPolicy, AuditLogger};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub use pipeline::{PipelineSnapshot, aggregate_status};

/// Build the registry with every catalog tool, in the order the model sees
/// them.
pub fn default_registry(
    cloud: Arc<dyn CloudApi>,
    retriever: Arc<dyn Retriever>,
    policy: ApprovalPolicy,
    audit: Arc<AuditLogger>,
    config: &AppConfig,
) -> ToolRegistry {
    let mut registry =
        ToolRegistry::new().with_timeout(Duration::from_secs(config.agent.tool_timeout_secs));

    registry.register(Arc::new(docs::RagSearchTool::new(
        retriever,
        config.retrieval.top_k,
    )));
    registry.register(Arc::new(storage::ListS3BucketsTool::new(cloud.clone())));
    registry.register(Arc::new(compute::DescribeEc2InstancesTool::new(cloud.clone())));
    registry.register(Arc::new(containers::EcsServiceStatusTool::new(cloud.clone())));
    registry.register(Arc::new(containers::ListEksClustersTool::new(cloud.clone())));
    registry.register(Arc::new(containers::DescribeEksClusterTool::new(cloud.clone())));
    registry.register(Arc::new(pipeline::PipelineStatusTool::new(cloud.clone())));
    registry.register(Arc::new(pipeline::ListPipelinesTool::new(cloud.clone())));
    registry.register(Arc::new(parameters::GetParameterTool::new(cloud.clone())));
    registry.register(Arc::new(parameters::ListParametersTool::new(cloud.clone())));
    registry.register(Arc::new(parameters::PutParameterTool::new(cloud, policy, audit)));
    registry
}

/// String at `key`, if present and a string.
pub(crate) fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Array at `key`, or an empty slice.
pub(crate) fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `title:` followed by an indented bullet per item.
pub(crate) fn bullets<I, S>(title: &str, items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    let mut out = title.to_string();
    for item in items {
        out.push_str(&format!("\n  - {item}"));
    }
    out
}
