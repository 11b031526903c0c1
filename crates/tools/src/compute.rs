//! EC2 instance inventory.

use async_trait::async_trait;
use cloudpilot_core::{CloudApi, CloudRequest, Identity, Tool, ToolError, ToolInput, ToolOutput};
use serde_json::Value;
use std::sync::Arc;

use crate::{array_at, bullets, str_at};

pub struct DescribeEc2InstancesTool {
    cloud: Arc<dyn CloudApi>,
}

impl DescribeEc2InstancesTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct InstanceRow<'a> {
    name: &'a str,
    id: &'a str,
    instance_type: &'a str,
    state: &'a str,
}

impl<'a> InstanceRow<'a> {
    fn from_json(instance: &'a Value) -> Self {
        let name = array_at(instance, "Tags")
            .iter()
            .find(|t| str_at(t, "Key") == Some("Name"))
            .and_then(|t| str_at(t, "Value"))
            .unwrap_or("unnamed");
        Self {
            name,
            id: str_at(instance, "InstanceId").unwrap_or_default(),
            instance_type: str_at(instance, "InstanceType").unwrap_or_default(),
            state: instance
                .get("State")
                .and_then(|s| str_at(s, "Name"))
                .unwrap_or_default(),
        }
    }

    /// Name substring or exact state, both case-insensitive.
    fn matches(&self, filter: &str) -> bool {
        filter.is_empty()
            || self.name.to_lowercase().contains(filter)
            || self.state.eq_ignore_ascii_case(filter)
    }
}

impl std::fmt::Display for InstanceRow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.name, self.id, self.instance_type, self.state
        )
    }
}

#[async_trait]
impl Tool for DescribeEc2InstancesTool {
    fn name(&self) -> &str {
        "describe_ec2_instances"
    }

    fn description(&self) -> &str {
        "List EC2 instances with their state, type, and name tag. \
         Optionally filter by instance name or state (e.g. 'running')."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("running")
    }

    fn service(&self) -> &str {
        "ec2"
    }

    fn failure_context(&self) -> &str {
        "describing EC2 instances"
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let filter = input.trim().to_lowercase();
        let response = self
            .cloud
            .call(identity, CloudRequest::new("ec2", "DescribeInstances"))
            .await?;

        let rows: Vec<InstanceRow<'_>> = array_at(&response, "Reservations")
            .iter()
            .flat_map(|r| array_at(r, "Instances"))
            .map(InstanceRow::from_json)
            .filter(|row| row.matches(&filter))
            .collect();

        if rows.is_empty() {
            return Ok("No EC2 instances found.".into());
        }
        Ok(bullets("EC2 Instances:", rows).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, identity};
    use serde_json::json;

    fn cloud() -> Arc<FakeCloud> {
        Arc::new(FakeCloud::new().respond(
            "ec2",
            "DescribeInstances",
            json!({"Reservations": [
                {"Instances": [
                    {"InstanceId": "i-1", "InstanceType": "t3.micro", "State": {"Name": "running"},
                     "Tags": [{"Key": "Name", "Value": "payments-api"}]},
                    {"InstanceId": "i-2", "InstanceType": "m5.large", "State": {"Name": "stopped"}, "Tags": []}
                ]},
                {"Instances": [
                    {"InstanceId": "i-3", "InstanceType": "t3.small", "State": {"Name": "running"},
                     "Tags": [{"Key": "team", "Value": "ops"}, {"Key": "Name", "Value": "bastion"}]}
                ]}
            ]}),
        ))
    }

    async fn run(input: &str) -> String {
        match DescribeEc2InstancesTool::new(cloud())
            .invoke(input, &identity("ec2"))
            .await
            .unwrap()
        {
            ToolOutput::Summary(text) => text,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_all_instances_across_reservations() {
        assert_eq!(
            run("").await,
            "EC2 Instances:\n  - payments-api | i-1 | t3.micro | running\n  \
             - unnamed | i-2 | m5.large | stopped\n  - bastion | i-3 | t3.small | running"
        );
    }

    #[tokio::test]
    async fn filters_by_state_or_name() {
        let stopped = run("stopped").await;
        assert!(stopped.contains("i-2"));
        assert!(!stopped.contains("i-1"));

        let named = run("Payments").await;
        assert!(named.contains("i-1"));
        assert!(!named.contains("i-3"));
    }

    #[tokio::test]
    async fn no_match_reports_none_found() {
        assert_eq!(run("terminated").await, "No EC2 instances found.");
    }
}
