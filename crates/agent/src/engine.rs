//! The command engine: one entry point for both modes.

use cloudpilot_config::AppConfig;
use cloudpilot_core::{Action, EventBus, IdentityResolver, Provider, Retriever, ToolRegistry};
use cloudpilot_memory::SessionMemory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::direct::DirectExecutor;
use crate::dispatch::{RequestScope, ScopedInvoker};
use crate::error::ExecuteError;
use crate::intent::IntentResolver;
use crate::react::Orchestrator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Agent,
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub mode: Mode,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            account_id: None,
            session_id: None,
            mode: Mode::Agent,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response: String,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub degraded_identity: bool,
    pub iterations: usize,
}

pub struct CommandEngine {
    direct: DirectExecutor,
    orchestrator: Orchestrator,
    invoker: Arc<ScopedInvoker>,
}

impl CommandEngine {
    pub fn new(direct: DirectExecutor, orchestrator: Orchestrator, invoker: Arc<ScopedInvoker>) -> Self {
        Self {
            direct,
            orchestrator,
            invoker,
        }
    }

    /// Wire both modes over one registry, resolver and event bus.
    pub fn build(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
        registry: Arc<ToolRegistry>,
        resolver: Arc<dyn IdentityResolver>,
        events: Arc<EventBus>,
    ) -> Self {
        let invoker = Arc::new(ScopedInvoker::new(registry, resolver, events.clone()));
        let intent = IntentResolver::new(provider.clone(), retriever, events.clone())
            .with_context_k(config.retrieval.intent_top_k);
        let memory = Arc::new(SessionMemory::new(
            config.agent.memory_window,
            config.agent.max_sessions,
        ));
        let orchestrator = Orchestrator::new(provider, invoker.clone(), memory, events)
            .with_max_iterations(config.agent.max_iterations);

        Self::new(DirectExecutor::new(intent, invoker.clone()), orchestrator, invoker)
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.invoker.registry()
    }

    pub async fn execute(&self, request: CommandRequest) -> Result<CommandResponse, ExecuteError> {
        let command = request.command.trim();
        if command.is_empty() {
            return Err(ExecuteError::EmptyCommand);
        }
        let scope = RequestScope::for_account(request.account_id.clone());

        info!(mode = ?request.mode, account = ?request.account_id, "Executing command");

        match request.mode {
            Mode::Direct => {
                let run = self.direct.execute(command, &scope).await?;
                Ok(CommandResponse {
                    response: run.outcome.render().to_string(),
                    mode: Mode::Direct,
                    session_id: request.session_id,
                    action: Some(run.action),
                    degraded_identity: run.degraded,
                    iterations: 0,
                })
            }
            Mode::Agent => {
                let session_id = request
                    .session_id
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let run = self.orchestrator.run(command, &session_id, &scope).await;
                Ok(CommandResponse {
                    response: run.answer,
                    mode: Mode::Agent,
                    session_id: Some(session_id),
                    action: None,
                    degraded_identity: run.degraded_identity,
                    iterations: run.iterations,
                })
            }
        }
    }
}
