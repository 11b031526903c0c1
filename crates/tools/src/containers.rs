//! ECS service status and EKS cluster inspection.

use async_trait::async_trait;
use cloudpilot_core::{CloudApi, CloudRequest, Identity, Tool, ToolError, ToolInput, ToolOutput};
use serde_json::Value;
use std::sync::Arc;

use crate::{array_at, bullets, str_at};

// ── ECS ──

pub struct EcsServiceStatusTool {
    cloud: Arc<dyn CloudApi>,
}

impl EcsServiceStatusTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

/// `cluster/service`, or a bare service name in the `default` cluster.
fn split_target(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split('/').collect::<Vec<_>>().as_slice() {
        &[cluster, service] => (cluster.trim(), service.trim()),
        _ => ("default", input),
    }
}

fn count(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

#[async_trait]
impl Tool for EcsServiceStatusTool {
    fn name(&self) -> &str {
        "get_ecs_service_status"
    }

    fn description(&self) -> &str {
        "Get ECS service deployment status. \
         Input format: 'cluster-name/service-name' or just 'service-name'."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("payments-cluster/payments-service")
    }

    fn service(&self) -> &str {
        "ecs"
    }

    fn failure_context(&self) -> &str {
        "fetching ECS service status"
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let (cluster, service) = split_target(input);
        if service.is_empty() {
            return Err(ToolError::InvalidInput(
                "Invalid format. Use: 'cluster-name/service-name' or 'service-name'".into(),
            ));
        }

        let request = CloudRequest::new("ecs", "DescribeServices")
            .param("cluster", cluster)
            .param("services", vec![service]);
        let response = self.cloud.call(identity, request).await?;

        let Some(svc) = array_at(&response, "services").first() else {
            return Err(ToolError::ResourceNotFound(format!(
                "No ECS service found: {service} in cluster {cluster}"
            )));
        };

        let task_def = str_at(svc, "taskDefinition")
            .and_then(|arn| arn.rsplit('/').next())
            .unwrap_or("N/A");

        Ok(format!(
            "ECS Service: {}\n  Cluster:  {cluster}\n  Status:   {}\n  Desired:  {}\n  \
             Running:  {}\n  Pending:  {}\n  Task Def: {task_def}",
            str_at(svc, "serviceName").unwrap_or(service),
            str_at(svc, "status").unwrap_or("UNKNOWN"),
            count(svc, "desiredCount"),
            count(svc, "runningCount"),
            count(svc, "pendingCount"),
        )
        .into())
    }
}

// ── EKS ──

pub struct ListEksClustersTool {
    cloud: Arc<dyn CloudApi>,
}

impl ListEksClustersTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl Tool for ListEksClustersTool {
    fn name(&self) -> &str {
        "list_eks_clusters"
    }

    fn description(&self) -> &str {
        "List all EKS clusters in the AWS account."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("")
    }

    fn service(&self) -> &str {
        "eks"
    }

    fn failure_context(&self) -> &str {
        "listing EKS clusters"
    }

    async fn invoke(&self, _input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let response = self
            .cloud
            .call(identity, CloudRequest::new("eks", "ListClusters"))
            .await?;
        let clusters: Vec<&str> = array_at(&response, "clusters")
            .iter()
            .filter_map(Value::as_str)
            .collect();

        if clusters.is_empty() {
            return Ok("No EKS clusters found.".into());
        }
        Ok(bullets("EKS Clusters:", clusters).into())
    }
}

pub struct DescribeEksClusterTool {
    cloud: Arc<dyn CloudApi>,
}

impl DescribeEksClusterTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

/// Region is the fourth field of `arn:aws:eks:{region}:{account}:cluster/{name}`.
fn region_from_arn(arn: &str) -> Option<&str> {
    arn.split(':').nth(3).filter(|r| !r.is_empty())
}

#[async_trait]
impl Tool for DescribeEksClusterTool {
    fn name(&self) -> &str {
        "describe_eks_cluster"
    }

    fn description(&self) -> &str {
        "Get detailed status of an EKS cluster by name."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("payments-cluster")
    }

    fn service(&self) -> &str {
        "eks"
    }

    fn failure_context(&self) -> &str {
        "describing EKS cluster"
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(ToolError::InvalidInput("EKS cluster name is required.".into()));
        }

        let response = self
            .cloud
            .call(
                identity,
                CloudRequest::new("eks", "DescribeCluster").param("name", name),
            )
            .await?;
        let cluster = response.get("cluster").unwrap_or(&Value::Null);

        Ok(format!(
            "EKS Cluster: {}\n  Status:     {}\n  Version:    {}\n  Endpoint:   {}\n  Region:     {}",
            str_at(cluster, "name").unwrap_or(name),
            str_at(cluster, "status").unwrap_or("UNKNOWN"),
            str_at(cluster, "version").unwrap_or("N/A"),
            str_at(cluster, "endpoint").unwrap_or("N/A"),
            str_at(cluster, "arn").and_then(region_from_arn).unwrap_or("N/A"),
        )
        .into())
    }
}
