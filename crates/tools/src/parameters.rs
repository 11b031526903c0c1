//! SSM Parameter Store: read, list, and gated write.

use async_trait::async_trait;
use cloudpilot_core::{CloudApi, CloudRequest, Identity, Tool, ToolError, ToolInput, ToolOutput};
use cloudpilot_security::{ApprovalPolicy, AuditEvent, AuditLogger, AuditOutcome};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{array_at, bullets, str_at};

/// Upper bound on `GetParametersByPath` pages followed for one listing.
const MAX_PAGES: usize = 10;

pub struct GetParameterTool {
    cloud: Arc<dyn CloudApi>,
}

impl GetParameterTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl Tool for GetParameterTool {
    fn name(&self) -> &str {
        "get_ssm_parameter"
    }

    fn description(&self) -> &str {
        "Fetch an environment variable or config value from AWS SSM Parameter Store."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("/prod/payments/DB_HOST")
    }

    fn service(&self) -> &str {
        "ssm"
    }

    fn failure_context(&self) -> &str {
        "fetching parameter"
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(ToolError::InvalidInput("Parameter name is required.".into()));
        }

        let request = CloudRequest::new("ssm", "GetParameter")
            .param("Name", name)
            .param("WithDecryption", true);
        let response = match self.cloud.call(identity, request).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => {
                return Err(ToolError::ResourceNotFound(format!(
                    "Parameter '{name}' not found in SSM Parameter Store."
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let value = response
            .get("Parameter")
            .and_then(|p| str_at(p, "Value"))
            .unwrap_or_default();
        Ok(format!("Parameter: {name}\nValue: {value}").into())
    }
}

pub struct ListParametersTool {
    cloud: Arc<dyn CloudApi>,
}

impl ListParametersTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl Tool for ListParametersTool {
    fn name(&self) -> &str {
        "list_ssm_parameters"
    }

    fn description(&self) -> &str {
        "List available SSM parameters under a given path prefix. \
         Example input: '/prod/payments' to list all payments prod variables."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("/prod/payments")
    }

    fn service(&self) -> &str {
        "ssm"
    }

    fn failure_context(&self) -> &str {
        "listing parameters"
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let path = match input.trim() {
            "" => "/",
            p => p,
        };

        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut request = CloudRequest::new("ssm", "GetParametersByPath")
                .param("Path", path)
                .param("Recursive", true);
            if let Some(token) = next_token.take() {
                request = request.param("NextToken", token);
            }

            let page = self.cloud.call(identity, request).await?;
            names.extend(
                array_at(&page, "Parameters")
                    .iter()
                    .filter_map(|p| str_at(p, "Name"))
                    .map(String::from),
            );
            next_token = str_at(&page, "NextToken")
                .filter(|t| !t.is_empty())
                .map(String::from);
            if next_token.is_none() {
                break;
            }
        }

        if names.is_empty() {
            return Ok(format!("No parameters found under path: {path}").into());
        }
        Ok(bullets(&format!("Parameters under '{path}':"), names).into())
    }
}

/// `name|value|environment`, each part trimmed.
#[derive(Debug, PartialEq, Eq)]
pub struct PutSpec<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub environment: &'a str,
}

impl<'a> PutSpec<'a> {
    pub fn parse(input: &'a str) -> Result<Self, ToolError> {
        match input.trim().split('|').map(str::trim).collect::<Vec<_>>().as_slice() {
            &[name, value, environment] if !name.is_empty() => Ok(Self {
                name,
                value,
                environment,
            }),
            _ => Err(ToolError::InvalidInput(
                "Invalid format. Use: 'parameter_name|value|environment'".into(),
            )),
        }
    }
}

pub struct PutParameterTool {
    cloud: Arc<dyn CloudApi>,
    policy: ApprovalPolicy,
    audit: Arc<AuditLogger>,
}

impl PutParameterTool {
    pub fn new(cloud: Arc<dyn CloudApi>, policy: ApprovalPolicy, audit: Arc<AuditLogger>) -> Self {
        Self {
            cloud,
            policy,
            audit,
        }
    }
}

#[async_trait]
impl Tool for PutParameterTool {
    fn name(&self) -> &str {
        "put_ssm_parameter"
    }

    fn description(&self) -> &str {
        "Add or update an environment variable in AWS SSM Parameter Store. \
         Production changes require DevOps approval and will NOT be applied automatically."
    }

    fn input(&self) -> ToolInput {
        ToolInput::delimited(
            &["parameter_name", "value", "environment"],
            '|',
            "/staging/payments/DB_HOST|db.staging.example.com|staging",
        )
    }

    fn service(&self) -> &str {
        "ssm"
    }

    fn failure_context(&self) -> &str {
        "updating parameter"
    }

    /// Input format and the production gate, checked before any identity
    /// is resolved.
    fn preflight(&self, input: &str) -> Option<Result<ToolOutput, ToolError>> {
        let spec = match PutSpec::parse(input) {
            Ok(spec) => spec,
            Err(err) => return Some(Err(err)),
        };
        if !self.policy.requires_approval(spec.name, spec.environment) {
            return None;
        }

        info!(parameter = spec.name, environment = spec.environment, "Write held for approval");
        self.audit.log(
            AuditEvent::ApprovalRequired {
                parameter: spec.name.into(),
            },
            self.name(),
            spec.name,
            AuditOutcome::Denied,
            Some(format!("environment={}", spec.environment)),
        );
        Some(Ok(ToolOutput::ApprovalRequired(self.policy.approval_message(
            spec.name,
            spec.value,
            spec.environment,
        ))))
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        if let Some(settled) = self.preflight(input) {
            return settled;
        }
        let spec = PutSpec::parse(input)?;

        let request = CloudRequest::new("ssm", "PutParameter")
            .param("Name", spec.name)
            .param("Value", spec.value)
            .param("Type", "SecureString")
            .param("Overwrite", true);
        let event = AuditEvent::ParameterWritten {
            parameter: spec.name.into(),
        };

        match self.cloud.call(identity, request).await {
            Ok(response) => {
                let version = response.get("Version").and_then(Value::as_i64);
                self.audit.log(
                    event,
                    self.name(),
                    spec.name,
                    AuditOutcome::Success,
                    version.map(|v| format!("version={v}")),
                );
                Ok(format!(
                    "✅ Parameter '{}' updated successfully in {}.",
                    spec.name, spec.environment
                )
                .into())
            }
            Err(err) => {
                warn!(parameter = spec.name, error = %err, "Parameter write failed");
                self.audit.log(
                    event,
                    self.name(),
                    spec.name,
                    AuditOutcome::Failure,
                    Some(err.to_string()),
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, access_denied, identity};
    use cloudpilot_core::{CloudError, FailureKind, ToolCall, ToolOutcome, ToolRegistry};
    use serde_json::json;

    fn put_tool(cloud: Arc<FakeCloud>) -> (PutParameterTool, Arc<AuditLogger>) {
        let audit = Arc::new(AuditLogger::new());
        let tool = PutParameterTool::new(cloud, ApprovalPolicy::default(), audit.clone());
        (tool, audit)
    }

    #[test]
    fn put_spec_parsing() {
        assert_eq!(
            PutSpec::parse(" /a/B | v 1 | staging ").unwrap(),
            PutSpec {
                name: "/a/B",
                value: "v 1",
                environment: "staging"
            }
        );
        assert!(PutSpec::parse("/a|b").is_err());
        assert!(PutSpec::parse("/a|b|c|d").is_err());
        assert!(PutSpec::parse(" |b|c").is_err());
    }

    #[tokio::test]
    async fn get_parameter_value() {
        let cloud = Arc::new(FakeCloud::new().respond(
            "ssm",
            "GetParameter",
            json!({"Parameter": {"Name": "/staging/app/DB_HOST", "Value": "db.internal"}}),
        ));
        let out = GetParameterTool::new(cloud.clone())
            .invoke("/staging/app/DB_HOST", &identity("ssm"))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::Summary("Parameter: /staging/app/DB_HOST\nValue: db.internal".into())
        );
        assert_eq!(cloud.calls()[0].params["WithDecryption"], json!(true));
    }

    #[tokio::test]
    async fn get_missing_parameter() {
        let cloud = FakeCloud::new().fail(
            "ssm",
            "GetParameter",
            CloudError::NotFound {
                service: "ssm".into(),
                code: "ParameterNotFound".into(),
                message: String::new(),
            },
        );
        let err = GetParameterTool::new(Arc::new(cloud))
            .invoke("MY_PARAM", &identity("ssm"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'MY_PARAM' not found in SSM Parameter Store."
        );
    }

    #[tokio::test]
    async fn list_defaults_to_root_and_is_recursive() {
        let cloud = Arc::new(FakeCloud::new().respond(
            "ssm",
            "GetParametersByPath",
            json!({"Parameters": [{"Name": "/a/x"}, {"Name": "/a/y"}]}),
        ));
        let out = ListParametersTool::new(cloud.clone())
            .invoke("  ", &identity("ssm"))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::Summary("Parameters under '/':\n  - /a/x\n  - /a/y".into())
        );
        let calls = cloud.calls();
        assert_eq!(calls[0].str_param("Path"), Some("/"));
        assert_eq!(calls[0].params["Recursive"], json!(true));
    }

    #[tokio::test]
    async fn list_pagination_is_bounded() {
        // The fake always returns a token, so only the page cap stops it.
        let cloud = Arc::new(FakeCloud::new().respond(
            "ssm",
            "GetParametersByPath",
            json!({"Parameters": [{"Name": "/p"}], "NextToken": "more"}),
        ));
        ListParametersTool::new(cloud.clone())
            .invoke("/prod", &identity("ssm"))
            .await
            .unwrap();
        let calls = cloud.calls();
        assert_eq!(calls.len(), MAX_PAGES);
        assert_eq!(calls[1].str_param("NextToken"), Some("more"));
    }

    #[tokio::test]
    async fn list_empty_path() {
        let cloud = FakeCloud::new().respond("ssm", "GetParametersByPath", json!({"Parameters": []}));
        let out = ListParametersTool::new(Arc::new(cloud))
            .invoke("/nothing", &identity("ssm"))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::Summary("No parameters found under path: /nothing".into())
        );
    }

    #[tokio::test]
    async fn production_write_requires_approval_and_never_calls_cloud() {
        let cloud = Arc::new(FakeCloud::new().respond("ssm", "PutParameter", json!({"Version": 2})));
        let (tool, audit) = put_tool(cloud.clone());

        let out = tool
            .invoke("/prod/app/DB_HOST|db.new|staging", &identity("ssm"))
            .await
            .unwrap();

        let ToolOutput::ApprovalRequired(text) = out else {
            panic!("expected approval request");
        };
        assert!(text.contains("Parameter: /prod/app/DB_HOST"));
        assert!(cloud.calls().is_empty());
        assert_eq!(
            audit.entries()[0].event,
            AuditEvent::ApprovalRequired {
                parameter: "/prod/app/DB_HOST".into()
            }
        );
    }

    #[test]
    fn preflight_settles_gated_and_malformed_writes() {
        let (tool, audit) = put_tool(Arc::new(FakeCloud::new()));

        assert!(matches!(
            tool.preflight("/app/DB_HOST|x|Production"),
            Some(Ok(ToolOutput::ApprovalRequired(_)))
        ));
        assert!(matches!(
            tool.preflight("/app/DB_HOST|x|staging|prod"),
            Some(Err(ToolError::InvalidInput(_)))
        ));
        assert!(tool.preflight("/staging/app/DB_HOST|x|staging").is_none());
        assert_eq!(audit.entries_by_outcome(&AuditOutcome::Denied).len(), 1);
    }

    #[tokio::test]
    async fn malformed_put_never_calls_cloud() {
        let cloud = Arc::new(FakeCloud::new());
        let (tool, _) = put_tool(cloud.clone());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool));

        let outcome = registry
            .invoke(&ToolCall::new("put_ssm_parameter", "just-a-name"), &identity("ssm"))
            .await;

        assert_eq!(
            outcome,
            ToolOutcome::failure(
                FailureKind::InvalidInput,
                "Invalid format. Use: 'parameter_name|value|environment'"
            )
        );
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn staging_write_goes_through() {
        let cloud = Arc::new(FakeCloud::new().respond("ssm", "PutParameter", json!({"Version": 2})));
        let (tool, audit) = put_tool(cloud.clone());

        let out = tool
            .invoke("/staging/app/DB_HOST|db.new|staging", &identity("ssm"))
            .await
            .unwrap();

        assert_eq!(
            out,
            ToolOutput::Summary("✅ Parameter '/staging/app/DB_HOST' updated successfully in staging.".into())
        );
        let calls = cloud.calls();
        assert_eq!(calls[0].str_param("Type"), Some("SecureString"));
        assert_eq!(calls[0].params["Overwrite"], json!(true));
        assert_eq!(audit.entries_by_outcome(&AuditOutcome::Success).len(), 1);
    }

    #[tokio::test]
    async fn failed_write_is_audited() {
        let cloud = Arc::new(FakeCloud::new().fail("ssm", "PutParameter", access_denied("ssm")));
        let (tool, audit) = put_tool(cloud);

        let err = tool
            .invoke("/dev/app/X|1|dev", &identity("ssm"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Cloud(CloudError::AccessDenied { .. })));
        assert_eq!(audit.entries_by_outcome(&AuditOutcome::Failure).len(), 1);
    }
}
