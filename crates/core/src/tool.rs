//! Tool trait: the abstraction over scoped cloud operations.
//!
//! Each tool wraps one bounded control-plane operation (list buckets,
//! inspect a pipeline, write a parameter, ...). Tools receive their input as
//! plain text because the orchestration loop feeds them whatever the model
//! wrote after `Action Input:`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CloudError, ToolError};
use crate::identity::Identity;

/// How a tool expects its text input to be shaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolInput {
    /// Free text (a name, a path, a query). May be empty.
    Text { example: String },
    /// Fixed fields joined by a separator, e.g. `name|value|environment`.
    Delimited {
        fields: Vec<String>,
        separator: char,
        example: String,
    },
}

impl ToolInput {
    pub fn text(example: impl Into<String>) -> Self {
        Self::Text {
            example: example.into(),
        }
    }

    pub fn delimited(fields: &[&str], separator: char, example: impl Into<String>) -> Self {
        Self::Delimited {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            separator,
            example: example.into(),
        }
    }

    /// One-line format hint shown to the model.
    pub fn format_hint(&self) -> String {
        match self {
            Self::Text { example } => format!("text, e.g. '{example}'"),
            Self::Delimited {
                fields,
                separator,
                example,
            } => {
                let sep = separator.to_string();
                format!("'{}', e.g. '{example}'", fields.join(&sep))
            }
        }
    }
}

/// Tool metadata exposed to the model and the HTTP catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub service: String,
    pub input: ToolInput,
}

/// A request to run a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to run
    pub name: String,

    /// Raw text input
    pub input: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
        }
    }
}

/// What a tool produced when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Summary(String),
    /// The operation was refused pending human approval. Not an error.
    ApprovalRequired(String),
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Summary(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Summary(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    PermissionDenied,
    NotFound,
    Throttled,
    Timeout,
    Upstream,
    UnknownTool,
}

/// The typed result of one tool invocation.
///
/// Converted to text only at the response boundary, or when fed back to
/// the model as an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    ApprovalRequired(String),
    Failure { kind: FailureKind, detail: String },
}

impl ToolOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// Classify a tool error. `context` describes what the tool was doing,
    /// e.g. "listing S3 buckets".
    pub fn from_error(context: &str, err: ToolError) -> Self {
        let kind = match &err {
            ToolError::UnknownTool(_) => FailureKind::UnknownTool,
            ToolError::InvalidInput(_) => FailureKind::InvalidInput,
            ToolError::ResourceNotFound(_) => FailureKind::NotFound,
            ToolError::Timeout { .. } => FailureKind::Timeout,
            ToolError::Retrieval(_) => FailureKind::Upstream,
            ToolError::Cloud(cloud) => match cloud {
                CloudError::AccessDenied { .. } => FailureKind::PermissionDenied,
                CloudError::NotFound { .. } => FailureKind::NotFound,
                CloudError::Throttled { .. } => FailureKind::Throttled,
                CloudError::Timeout { .. } => FailureKind::Timeout,
                _ => FailureKind::Upstream,
            },
        };

        // Operator-phrased messages stand on their own.
        let detail = match err {
            ToolError::InvalidInput(msg) | ToolError::ResourceNotFound(msg) => msg,
            other => format!("Error {context}: {other}"),
        };
        Self::Failure { kind, detail }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Display text.
    pub fn render(&self) -> &str {
        match self {
            Self::Success(text) | Self::ApprovalRequired(text) => text,
            Self::Failure { detail, .. } => detail,
        }
    }
}

impl From<ToolOutput> for ToolOutcome {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Summary(text) => Self::Success(text),
            ToolOutput::ApprovalRequired(text) => Self::ApprovalRequired(text),
        }
    }
}

/// The core Tool trait.
///
/// Every catalog entry (list_s3_buckets, get_pipeline_status,
/// put_ssm_parameter, ...) implements this trait and is registered once at
/// startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "list_s3_buckets").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    fn input(&self) -> ToolInput;

    /// The cloud service whose identity this tool runs under.
    fn service(&self) -> &str;

    /// Gerund phrase used in failure messages ("listing S3 buckets").
    fn failure_context(&self) -> &str;

    /// Whether the tool touches an account and so needs a scoped identity.
    /// Unscoped tools always run under the ambient identity.
    fn scoped(&self) -> bool {
        true
    }

    /// Settle the call from its input alone, before any identity is
    /// resolved or any external call is made. `Some` short-circuits the
    /// invocation; `None` lets it proceed.
    fn preflight(&self, _input: &str) -> Option<std::result::Result<ToolOutput, ToolError>> {
        None
    }

    /// Run the tool with raw text input under a resolved identity.
    async fn invoke(
        &self,
        input: &str,
        identity: &Identity,
    ) -> std::result::Result<ToolOutput, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            service: self.service().to_string(),
            input: self.input(),
        }
    }
}

/// The fixed set of tools available to both execution modes.
///
/// Built once at startup and shared read-only. Registration order is kept
/// so the model always sees the catalog in the same order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn unknown_tool(&self, name: &str) -> ToolOutcome {
        warn!(tool = %name, "Unknown tool requested");
        ToolOutcome::failure(
            FailureKind::UnknownTool,
            format!(
                "{name} is not a valid tool, try one of [{}].",
                self.names().join(", ")
            ),
        )
    }

    /// The outcome of a call that can be decided without an identity: an
    /// unknown tool name, or whatever the tool's [`Tool::preflight`] settles.
    pub fn preflight(&self, call: &ToolCall) -> Option<ToolOutcome> {
        let Some(tool) = self.get(&call.name) else {
            return Some(self.unknown_tool(&call.name));
        };
        let settled = tool.preflight(&call.input)?;
        debug!(tool = %call.name, "Settled before identity resolution");
        Some(match settled {
            Ok(output) => output.into(),
            Err(err) => {
                warn!(tool = %call.name, error = %err, "Tool rejected input");
                ToolOutcome::from_error(tool.failure_context(), err)
            }
        })
    }

    /// Run a tool call. Never fails: every error becomes a
    /// [`ToolOutcome::Failure`].
    pub async fn invoke(&self, call: &ToolCall, identity: &Identity) -> ToolOutcome {
        if let Some(outcome) = self.preflight(call) {
            return outcome;
        }
        let Some(tool) = self.get(&call.name) else {
            return self.unknown_tool(&call.name);
        };

        debug!(tool = %call.name, service = tool.service(), "Invoking tool");
        match tokio::time::timeout(self.timeout, tool.invoke(&call.input, identity)).await {
            Ok(Ok(output)) => output.into(),
            Ok(Err(err)) => {
                warn!(tool = %call.name, error = %err, "Tool failed");
                ToolOutcome::from_error(tool.failure_context(), err)
            }
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                ToolOutcome::from_error(
                    tool.failure_context(),
                    ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    },
                )
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
