//! CodePipeline status and listing.
//!
//! A pipeline's status is assembled per request from three independent
//! reads issued concurrently. Nothing is cached between requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudpilot_core::{
    CloudApi, CloudError, CloudRequest, Identity, Tool, ToolError, ToolInput, ToolOutput,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{array_at, bullets, str_at};

fn priority(status: &str) -> u8 {
    match status {
        "Failed" => 3,
        "InProgress" => 2,
        "Succeeded" => 1,
        _ => 0,
    }
}

/// Highest-priority item by status. The first of equal priority wins.
fn highest<'a, T>(items: impl IntoIterator<Item = T>, status: impl Fn(&T) -> &'a str) -> Option<T> {
    let mut best: Option<(u8, T)> = None;
    for item in items {
        let p = priority(status(&item));
        if best.as_ref().is_none_or(|(bp, _)| p > *bp) {
            best = Some((p, item));
        }
    }
    best.map(|(_, item)| item)
}

/// Overall status across stage executions: Failed > InProgress > Succeeded
/// > anything else. `None` when there are no executions.
pub fn aggregate_status<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    highest(statuses, |s| *s)
}

/// Everything known about a pipeline at the moment of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub name: String,
    pub status: Option<String>,
    pub last_status_change: Option<String>,
    pub branch: Option<String>,
    pub repository: Option<String>,
    pub provider: Option<String>,
    pub commit_id: Option<String>,
}

impl PipelineSnapshot {
    /// Combine the three reads. `executions` and `actions` are both
    /// `GetPipelineState` responses; `definition` is `GetPipeline`.
    pub fn assemble(name: &str, executions: &Value, definition: &Value, actions: &Value) -> Self {
        let mut snapshot = Self {
            name: name.to_string(),
            ..Self::default()
        };

        let latest = array_at(executions, "stageStates")
            .iter()
            .filter_map(|stage| stage.get("latestExecution"));
        if let Some(overall) = highest(latest, |e| str_at(*e, "status").unwrap_or_default()) {
            snapshot.status = str_at(overall, "status").map(String::from);
            snapshot.last_status_change = overall.get("lastStatusChange").and_then(timestamp);
        }

        let source_stage = definition
            .get("pipeline")
            .map(|p| array_at(p, "stages"))
            .unwrap_or_default()
            .iter()
            .find(|s| is_source(str_at(s, "name")));
        if let Some(action) = source_stage.and_then(|s| array_at(s, "actions").first()) {
            let config = action.get("configuration").unwrap_or(&Value::Null);
            snapshot.provider = action
                .get("actionTypeId")
                .and_then(|t| str_at(t, "provider"))
                .map(String::from);
            snapshot.repository = str_at(config, "FullRepositoryId")
                .or_else(|| str_at(config, "RepositoryName"))
                .map(String::from);
            snapshot.branch = str_at(config, "BranchName").map(String::from);
        }

        snapshot.commit_id = array_at(actions, "stageStates")
            .iter()
            .find(|s| is_source(str_at(s, "stageName")))
            .and_then(|s| array_at(s, "actionStates").first())
            .and_then(|a| a.get("latestExecution"))
            .and_then(|e| str_at(e, "externalExecutionId"))
            .map(String::from);

        snapshot
    }
}

fn is_source(stage_name: Option<&str>) -> bool {
    stage_name.is_some_and(|n| n.eq_ignore_ascii_case("source"))
}

/// JSON 1.1 timestamps are epoch seconds; some fakes send strings.
fn timestamp(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let millis = (secs * 1000.0).round() as i64;
            DateTime::<Utc>::from_timestamp_millis(millis).map(|t| t.to_rfc3339())
        }
        _ => None,
    }
}

impl std::fmt::Display for PipelineSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".into());
        write!(
            f,
            "Pipeline: {}\n  Status:     {}\n  Last run:   {}\n  Branch:     {}\n  \
             Repository: {}\n  Provider:   {}\n  Commit ID:  {}",
            self.name,
            self.status.as_deref().unwrap_or("Unknown"),
            na(&self.last_status_change),
            na(&self.branch),
            na(&self.repository),
            na(&self.provider),
            na(&self.commit_id),
        )
    }
}

// ── Tools ──

pub struct PipelineStatusTool {
    cloud: Arc<dyn CloudApi>,
}

impl PipelineStatusTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }

    async fn snapshot(&self, name: &str, identity: &Identity) -> Result<PipelineSnapshot, CloudError> {
        let state = || CloudRequest::new("codepipeline", "GetPipelineState").param("name", name);
        let (executions, definition, actions) = tokio::try_join!(
            self.cloud.call(identity, state()),
            self.cloud.call(
                identity,
                CloudRequest::new("codepipeline", "GetPipeline").param("name", name)
            ),
            self.cloud.call(identity, state()),
        )?;
        Ok(PipelineSnapshot::assemble(name, &executions, &definition, &actions))
    }
}

#[async_trait]
impl Tool for PipelineStatusTool {
    fn name(&self) -> &str {
        "get_pipeline_status"
    }

    fn description(&self) -> &str {
        "Get the full status of a CodePipeline, including current status, \
         branch, latest commit ID, and source repository."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("payments-prod-pipeline")
    }

    fn service(&self) -> &str {
        "codepipeline"
    }

    fn failure_context(&self) -> &str {
        "fetching pipeline status"
    }

    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(ToolError::InvalidInput("Pipeline name is required.".into()));
        }

        match self.snapshot(name, identity).await {
            Ok(snapshot) => {
                debug!(pipeline = name, status = ?snapshot.status, "Pipeline snapshot");
                Ok(snapshot.to_string().into())
            }
            Err(err) if err.is_not_found() => Err(ToolError::ResourceNotFound(format!(
                "Pipeline '{name}' not found."
            ))),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct ListPipelinesTool {
    cloud: Arc<dyn CloudApi>,
}

impl ListPipelinesTool {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl Tool for ListPipelinesTool {
    fn name(&self) -> &str {
        "list_pipelines"
    }

    fn description(&self) -> &str {
        "List all CodePipelines in the AWS account. \
         Use this when the developer doesn't know the exact pipeline name."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("")
    }

    fn service(&self) -> &str {
        "codepipeline"
    }

    fn failure_context(&self) -> &str {
        "listing pipelines"
    }

    async fn invoke(&self, _input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        let response = self
            .cloud
            .call(identity, CloudRequest::new("codepipeline", "ListPipelines"))
            .await?;
        let names: Vec<&str> = array_at(&response, "pipelines")
            .iter()
            .filter_map(|p| str_at(p, "name"))
            .collect();

        if names.is_empty() {
            return Ok("No pipelines found.".into());
        }
        Ok(bullets("Available Pipelines:", names).into())
    }
}
