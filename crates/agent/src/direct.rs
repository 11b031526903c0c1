//! Direct mode: resolve one action, extract its argument, run one tool.

use cloudpilot_core::{Action, ToolCall, ToolOutcome};
use std::sync::Arc;
use tracing::info;

use crate::dispatch::{RequestScope, ScopedInvoker};
use crate::error::ExecuteError;
use crate::extract;
use crate::intent::{IntentResolver, Tier};

/// The result of a direct-mode command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRun {
    pub action: Action,
    pub tier: Tier,
    pub outcome: ToolOutcome,
    pub degraded: bool,
}

/// Map a resolved action and the operator's text to a tool call.
pub fn plan(action: Action, query: &str) -> Result<ToolCall, ExecuteError> {
    let Some(tool) = action.tool_name() else {
        return Err(ExecuteError::Unmapped(query.trim().to_string()));
    };

    let missing = |what: &str| ExecuteError::MissingArgument(format!("{what} not found"));
    let input = match action {
        Action::ListStorage | Action::ListPipelines | Action::ListClusters => String::new(),
        Action::DescribeCompute => extract::instance_state(query).unwrap_or_default().to_string(),
        Action::PipelineStatus => extract::pipeline_name(query).ok_or_else(|| missing("Pipeline name"))?,
        Action::EcsStatus => extract::ecs_target(query).ok_or_else(|| missing("ECS service name"))?,
        Action::DescribeCluster => extract::cluster_name(query).ok_or_else(|| missing("Cluster name"))?,
        Action::GetParameter => extract::parameter_name(query).ok_or_else(|| missing("Parameter name"))?,
        Action::ListParameters => extract::parameter_path(query),
        Action::PutParameter => extract::put_spec(query).ok_or_else(|| {
            ExecuteError::MissingArgument(
                "Parameter update not found. Use: 'parameter_name|value|environment'".into(),
            )
        })?,
        Action::SearchDocs => query.trim().to_string(),
        Action::Unknown => return Err(ExecuteError::Unmapped(query.trim().to_string())),
    };

    Ok(ToolCall::new(tool, input))
}

pub struct DirectExecutor {
    intent: IntentResolver,
    invoker: Arc<ScopedInvoker>,
}

impl DirectExecutor {
    pub fn new(intent: IntentResolver, invoker: Arc<ScopedInvoker>) -> Self {
        Self { intent, invoker }
    }

    pub async fn execute(&self, query: &str, scope: &RequestScope) -> Result<DirectRun, ExecuteError> {
        let resolution = self.intent.resolve(query).await;
        let call = plan(resolution.action, query)?;

        info!(action = %resolution.action, tool = %call.name, "Direct dispatch");
        let invocation = self.invoker.invoke(&call, scope).await;

        Ok(DirectRun {
            action: resolution.action,
            tier: resolution.tier,
            outcome: invocation.outcome,
            degraded: invocation.degraded,
        })
    }
}
