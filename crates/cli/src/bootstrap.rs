//! Process wiring: every shared component is built once here and handed
//! to the engine as an `Arc`.

use cloudpilot_agent::CommandEngine;
use cloudpilot_aws::{AwsClient, StsRoleAssumer};
use cloudpilot_config::{AppConfig, ConfigError};
use cloudpilot_core::{DomainEvent, EventBus};
use cloudpilot_security::{ApprovalPolicy, AuditLogger, CredentialBroker};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub struct Runtime {
    pub config: AppConfig,
    pub engine: Arc<CommandEngine>,
}

/// Load from `path` when given, else search the default locations.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => AppConfig::load(),
    }
}

pub fn build(config: AppConfig) -> Runtime {
    let events = Arc::new(EventBus::default());
    tokio::spawn(log_events(events.clone()));

    let provider = cloudpilot_providers::build_from_config(&config.llm);
    let retriever = cloudpilot_memory::build_from_config(&config.retrieval, provider.clone());

    let aws = Arc::new(AwsClient::from_config(&config.aws));
    let ambient = cloudpilot_aws::from_env();
    if ambient.is_none() {
        warn!("No AWS credentials in the environment; cloud calls will be rejected");
    }
    let assumer = Arc::new(StsRoleAssumer::new(aws.clone(), ambient.clone()));
    let audit = Arc::new(AuditLogger::tracing());
    let broker = Arc::new(
        CredentialBroker::from_config(&config, assumer, ambient).with_audit(audit.clone()),
    );

    let registry = Arc::new(cloudpilot_tools::default_registry(
        aws,
        retriever.clone(),
        ApprovalPolicy::default(),
        audit,
        &config,
    ));
    info!(
        tools = registry.len(),
        provider = %config.llm.provider,
        model = %config.llm.model,
        region = %config.aws.region,
        "Runtime ready"
    );

    let engine = CommandEngine::build(&config, provider, retriever, registry, broker, events);
    Runtime {
        config,
        engine: Arc::new(engine),
    }
}

async fn log_events(events: Arc<EventBus>) {
    let mut rx = events.subscribe();
    drop(events);
    loop {
        match rx.recv().await {
            Ok(event) => match event.as_ref() {
                DomainEvent::ToolExecuted {
                    tool_name,
                    failure,
                    degraded_identity,
                    duration_ms,
                    ..
                } => debug!(tool = %tool_name, ?failure, degraded_identity, duration_ms, "event: tool executed"),
                DomainEvent::IntentResolved { action, tier, .. } => {
                    debug!(action = %action, tier = %tier, "event: intent resolved")
                }
                DomainEvent::AgentFinished {
                    session_id,
                    status,
                    iterations,
                    ..
                } => debug!(session = %session_id, status = %status, iterations, "event: agent finished"),
                DomainEvent::ErrorOccurred {
                    context,
                    error_message,
                    ..
                } => warn!(context = %context, error = %error_message, "event: error"),
            },
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
