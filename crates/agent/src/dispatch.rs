//! Scoped tool dispatch: every invocation gets its own resolved identity.
//!
//! The request's account scope travels explicitly from the caller to the
//! broker; nothing is stored in task-local or global state.

use chrono::Utc;
use cloudpilot_core::{
    DomainEvent, EventBus, FailureKind, IdentityResolver, ToolCall, ToolOutcome, ToolRegistry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Which account and region a request targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestScope {
    pub account_id: Option<String>,
    pub region: Option<String>,
}

impl RequestScope {
    pub fn for_account(account_id: Option<String>) -> Self {
        Self {
            account_id,
            region: None,
        }
    }
}

/// One tool call's outcome and whether it ran under a fallback identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub outcome: ToolOutcome,
    pub degraded: bool,
}

pub struct ScopedInvoker {
    registry: Arc<ToolRegistry>,
    resolver: Arc<dyn IdentityResolver>,
    events: Arc<EventBus>,
}

impl ScopedInvoker {
    pub fn new(
        registry: Arc<ToolRegistry>,
        resolver: Arc<dyn IdentityResolver>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            resolver,
            events,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Resolve an identity for the tool's service, then run it.
    ///
    /// Calls the registry can settle from the input alone (unknown tools,
    /// malformed input, writes held for approval) never reach the resolver,
    /// so no role is assumed for them.
    pub async fn invoke(&self, call: &ToolCall, scope: &RequestScope) -> Invocation {
        let start = Instant::now();

        let (outcome, degraded) = match (self.registry.preflight(call), self.registry.get(&call.name)) {
            (None, Some(tool)) => {
                let account = if tool.scoped() {
                    scope.account_id.as_deref()
                } else {
                    None
                };
                let identity = self
                    .resolver
                    .resolve(tool.service(), account, scope.region.as_deref())
                    .await;
                if identity.is_degraded() {
                    warn!(tool = %call.name, source = ?identity.source, "Running under degraded identity");
                }
                let degraded = identity.is_degraded();
                (self.registry.invoke(call, &identity).await, degraded)
            }
            (Some(settled), _) => (settled, false),
            // preflight always settles unknown names
            (None, None) => (
                ToolOutcome::failure(FailureKind::UnknownTool, format!("{} is not a valid tool", call.name)),
                false,
            ),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(tool = %call.name, duration_ms, failure = ?outcome.failure_kind(), "Tool finished");
        self.events.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            failure: outcome.failure_kind(),
            degraded_identity: degraded,
            duration_ms,
            timestamp: Utc::now(),
        });

        Invocation { outcome, degraded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FallbackResolver, stub_registry};

    fn invoker(resolver: Arc<FallbackResolver>, events: Arc<EventBus>) -> ScopedInvoker {
        ScopedInvoker::new(stub_registry(), resolver, events)
    }

    #[tokio::test]
    async fn scoped_call_reports_degraded_identity() {
        let resolver = Arc::new(FallbackResolver::new());
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        let invocation = invoker(resolver.clone(), events)
            .invoke(
                &ToolCall::new("list_s3_buckets", ""),
                &RequestScope::for_account(Some("123456789012".into())),
            )
            .await;

        assert!(invocation.degraded);
        assert!(invocation.outcome.is_success());
        assert_eq!(
            resolver.resolved.lock().unwrap().as_slice(),
            [("stub".to_string(), Some("123456789012".to_string()))]
        );

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted {
                tool_name,
                degraded_identity,
                failure,
                ..
            } => {
                assert_eq!(tool_name, "list_s3_buckets");
                assert!(*degraded_identity);
                assert!(failure.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn unscoped_tool_ignores_account() {
        let resolver = Arc::new(FallbackResolver::new());
        let invocation = invoker(resolver.clone(), Arc::new(EventBus::default()))
            .invoke(
                &ToolCall::new("rag_search", "runbook"),
                &RequestScope::for_account(Some("123456789012".into())),
            )
            .await;

        assert!(!invocation.degraded);
        assert_eq!(resolver.resolved.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn unknown_tool_is_soft_failure() {
        let invocation = invoker(Arc::new(FallbackResolver::new()), Arc::new(EventBus::default()))
            .invoke(&ToolCall::new("drop_tables", ""), &RequestScope::default())
            .await;
        assert_eq!(
            invocation.outcome.failure_kind(),
            Some(FailureKind::UnknownTool)
        );
        assert!(!invocation.degraded);
    }

    #[tokio::test]
    async fn unknown_tool_resolves_no_identity() {
        let resolver = Arc::new(FallbackResolver::new());
        invoker(resolver.clone(), Arc::new(EventBus::default()))
            .invoke(
                &ToolCall::new("drop_tables", ""),
                &RequestScope::for_account(Some("123456789012".into())),
            )
            .await;
        assert!(resolver.resolved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn settled_input_resolves_no_identity() {
        let resolver = Arc::new(FallbackResolver::new());
        let invocation = invoker(resolver.clone(), Arc::new(EventBus::default()))
            .invoke(
                &ToolCall::new("put_ssm_parameter", "hold"),
                &RequestScope::for_account(Some("123456789012".into())),
            )
            .await;

        assert!(matches!(invocation.outcome, ToolOutcome::ApprovalRequired(_)));
        assert!(!invocation.degraded);
        assert!(resolver.resolved.lock().unwrap().is_empty());
    }
}
