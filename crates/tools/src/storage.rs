//! S3 bucket listing.

use async_trait::async_trait;
use cloudpilot_core::{CloudApi, CloudRequest, Identity, Tool, ToolError, ToolInput, ToolOutput};
use std::sync::Arc;

use crate::{array_at, bullets, str_at};

pub struct ListS3BucketsTool {
    cloud: Arc<dyn CloudApi>,
}

impl ListS3BucketsTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl Tool for ListS3BucketsTool {
    fn name(&self) -> &str {
        "list_s3_buckets"
    }

    fn description(&self) -> &str {
        "List all S3 buckets in the AWS account."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("")
    }

    fn service(&self) -> &str {
        "s3"
    }

    fn failure_context(&self) -> &str {
        "listing S3 buckets"
    }

    async fn invoke(&self, _input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let response = self
            .cloud
            .call(identity, CloudRequest::new("s3", "ListBuckets"))
            .await?;

        let names: Vec<&str> = array_at(&response, "Buckets")
            .iter()
            .filter_map(|b| str_at(b, "Name"))
            .collect();

        if names.is_empty() {
            return Ok("No S3 buckets found.".into());
        }
        Ok(bullets(&format!("S3 Buckets ({} total):", names.len()), names).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, access_denied, identity};
    use cloudpilot_core::{FailureKind, ToolCall, ToolRegistry};
    use serde_json::json;

    #[tokio::test]
    async fn lists_bucket_names_with_count() {
        let cloud = FakeCloud::new().respond(
            "s3",
            "ListBuckets",
            json!({"Buckets": [{"Name": "logs"}, {"Name": "artifacts"}]}),
        );
        let out = ListS3BucketsTool::new(Arc::new(cloud))
            .invoke("", &identity("s3"))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::Summary("S3 Buckets (2 total):\n  - logs\n  - artifacts".into())
        );
    }

    #[tokio::test]
    async fn no_buckets() {
        let cloud = FakeCloud::new().respond("s3", "ListBuckets", json!({"Buckets": []}));
        let out = ListS3BucketsTool::new(Arc::new(cloud))
            .invoke("", &identity("s3"))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Summary("No S3 buckets found.".into()));
    }

    #[tokio::test]
    async fn access_denied_is_soft_failure() {
        let cloud = FakeCloud::new().fail("s3", "ListBuckets", access_denied("s3"));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ListS3BucketsTool::new(Arc::new(cloud))));

        let outcome = registry
            .invoke(&ToolCall::new("list_s3_buckets", ""), &identity("s3"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::PermissionDenied));
        assert!(outcome.render().starts_with("Error listing S3 buckets: "));
    }
}
