//! ReAct orchestration: Thought → Action → Observation until a final answer.
//!
//! Each step is one completion call. The reply is read with
//! [`parse::parse_step`]; a tool step runs through the [`ScopedInvoker`] and
//! its rendered outcome becomes the next observation. Malformed steps are
//! observations too, and every step counts toward the ceiling.

pub mod parse;
pub mod prompt;
pub mod scratchpad;

use chrono::Utc;
use cloudpilot_core::{CompletionRequest, DomainEvent, EventBus, Provider, ToolCall};
use cloudpilot_memory::SessionMemory;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dispatch::{RequestScope, ScopedInvoker};
use parse::{Decision, StepError, parse_step};
use scratchpad::Scratchpad;

const STOP: &str = "\nObservation:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Done,
    /// The step ceiling was reached without a final answer.
    Aborted,
    /// The model could not be reached, or a step panicked.
    Errored,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Done => "done",
            RunStatus::Aborted => "aborted",
            RunStatus::Errored => "errored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub status: RunStatus,
    pub iterations: usize,
    pub tool_calls: usize,
    /// Whether any tool ran under a fallback identity.
    pub degraded_identity: bool,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    invoker: Arc<ScopedInvoker>,
    memory: Arc<SessionMemory>,
    events: Arc<EventBus>,
    max_iterations: usize,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        invoker: Arc<ScopedInvoker>,
        memory: Arc<SessionMemory>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            invoker,
            memory,
            events,
            max_iterations: 25,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Run one question to completion. Never fails: errors and panics in a
    /// step come back as an [`AgentRun`] with [`RunStatus::Errored`].
    pub async fn run(&self, question: &str, session_id: &str, scope: &RequestScope) -> AgentRun {
        let registry = self.invoker.registry();
        let catalog = registry.definitions();
        let history = self.memory.history(session_id).await;
        let mut pad = Scratchpad::new(self.max_iterations);
        let mut tool_calls = 0usize;
        let mut degraded = false;

        info!(session = %session_id, max_iter = self.max_iterations, "ReAct loop starting");

        let (answer, status) = loop {
            if !pad.tick() {
                warn!("ReAct: max iterations reached ({})", self.max_iterations);
                break (self.budget_exhausted(&pad), RunStatus::Aborted);
            }
            debug!(iteration = pad.iterations, "ReAct iteration");

            let request = CompletionRequest::new(prompt::render(
                &catalog,
                &history,
                question,
                &pad.render(),
            ))
            .with_stop(STOP);

            let text = match AssertUnwindSafe(self.provider.complete(request)).catch_unwind().await {
                Ok(Ok(completion)) => completion.text,
                Ok(Err(e)) => break self.errored("react completion", e.to_string()),
                Err(panic) => break self.errored("react completion", panic_message(&*panic)),
            };
            // Some backends ignore stop sequences.
            let text = match text.find(STOP) {
                Some(at) => text[..at].to_string(),
                None => text,
            };

            match parse_step(&text, registry) {
                Ok(Decision::Finish(answer)) => break (answer, RunStatus::Done),
                Ok(Decision::Act { tool, input }) => {
                    tool_calls += 1;
                    debug!(tool = %tool, input = %input, "ReAct action");
                    let call = ToolCall::new(tool, input);
                    let invocation = match AssertUnwindSafe(self.invoker.invoke(&call, scope))
                        .catch_unwind()
                        .await
                    {
                        Ok(invocation) => invocation,
                        Err(panic) => break self.errored("react tool", panic_message(&*panic)),
                    };
                    degraded |= invocation.degraded;
                    pad.record(text, invocation.outcome.render());
                }
                Err(e) => {
                    warn!(error = %e, "ReAct step rejected");
                    let observation = match &e {
                        StepError::UnknownTool(_) => {
                            format!("{e}, try one of [{}].", registry.names().join(", "))
                        }
                        _ => e.to_string(),
                    };
                    pad.record(text, observation);
                }
            }
        };

        if status != RunStatus::Errored {
            self.memory.append(session_id, question, answer.as_str()).await;
        }

        info!(
            iterations = pad.iterations,
            tool_calls,
            status = status.as_str(),
            "ReAct loop finished"
        );
        self.events.publish(DomainEvent::AgentFinished {
            session_id: session_id.to_string(),
            status: status.as_str().into(),
            iterations: pad.iterations,
            timestamp: Utc::now(),
        });

        AgentRun {
            answer,
            status,
            iterations: pad.iterations,
            tool_calls,
            degraded_identity: degraded,
        }
    }

    fn errored(&self, context: &str, message: String) -> (String, RunStatus) {
        warn!(context, error = %message, "ReAct step failed");
        let answer = format!("Agent error: {message}");
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.into(),
            error_message: message,
            timestamp: Utc::now(),
        });
        (answer, RunStatus::Errored)
    }

    fn budget_exhausted(&self, pad: &Scratchpad) -> String {
        let mut answer = format!(
            "Agent stopped after {} steps without reaching a final answer.",
            self.max_iterations
        );
        if let Some(last) = pad.last_observation() {
            answer.push_str("\nLast observation: ");
            answer.push_str(last);
        }
        answer
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unexpected failure".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, FallbackResolver, SequentialMockProvider, stub_registry};

    struct Fixture {
        orchestrator: Orchestrator,
        memory: Arc<SessionMemory>,
        events: Arc<EventBus>,
    }

    fn fixture(provider: Arc<dyn Provider>) -> Fixture {
        let events = Arc::new(EventBus::default());
        let memory = Arc::new(SessionMemory::new(10, 16));
        let invoker = Arc::new(ScopedInvoker::new(
            stub_registry(),
            Arc::new(FallbackResolver::new()),
            events.clone(),
        ));
        Fixture {
            orchestrator: Orchestrator::new(provider, invoker, memory.clone(), events.clone()),
            memory,
            events,
        }
    }

    #[tokio::test]
    async fn tool_then_answer() {
        let provider = Arc::new(SequentialMockProvider::new([
            "I should check the pipeline.\nAction: get_pipeline_status\nAction Input: payments-prod",
            "Thought: I now know the final answer\nFinal Answer: payments-prod is Succeeded.",
        ]));
        let f = fixture(provider.clone());

        let run = f
            .orchestrator
            .run("how is payments-prod?", "s1", &RequestScope::default())
            .await;

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.answer, "payments-prod is Succeeded.");
        assert_eq!(run.iterations, 2);
        assert_eq!(run.tool_calls, 1);
        assert!(!run.degraded_identity);

        let requests = provider.requests();
        assert_eq!(requests[0].stop, vec!["\nObservation:".to_string()]);
        assert!(requests[1].prompt.contains(
            "Observation: get_pipeline_status ran with 'payments-prod' as Ambient\nThought: "
        ));

        let history = f.memory.history("s1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].output, "payments-prod is Succeeded.");
    }

    #[tokio::test]
    async fn never_finishing_model_hits_ceiling() {
        let provider = Arc::new(SequentialMockProvider::single_text(
            "Thought: again\nAction: list_s3_buckets\nAction Input: ",
        ));
        let f = fixture(provider.clone());

        let run = f.orchestrator.run("loop forever", "s1", &RequestScope::default()).await;

        assert_eq!(provider.call_count(), 25);
        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(run.iterations, 25);
        assert!(run.answer.starts_with("Agent stopped after 25 steps"));
        assert!(run.answer.contains("list_s3_buckets ran with ''"));
        assert_eq!(f.memory.history("s1").await.len(), 1);
    }

    #[tokio::test]
    async fn malformed_steps_count_and_are_observed() {
        let provider = Arc::new(SequentialMockProvider::new([
            "I am not following the format.",
            "Action: format_disk\nAction Input: /",
            "Final Answer: sorry",
        ]));
        let f = fixture(provider.clone());

        let run = f.orchestrator.run("q", "s1", &RequestScope::default()).await;

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.iterations, 3);
        assert_eq!(run.tool_calls, 0);
        let last_prompt = &provider.requests()[2].prompt;
        assert!(last_prompt.contains("Observation: Invalid Format: Missing 'Action:' after 'Thought:'"));
        assert!(last_prompt.contains("Observation: 'format_disk' is not a valid tool, try one of ["));
    }

    #[tokio::test]
    async fn completion_failure_is_errored_and_forgotten() {
        let f = fixture(Arc::new(FailingProvider::new()));
        let mut rx = f.events.subscribe();

        let run = f.orchestrator.run("q", "s1", &RequestScope::default()).await;

        assert_eq!(run.status, RunStatus::Errored);
        assert!(run.answer.starts_with("Agent error: "));
        assert!(f.memory.history("s1").await.is_empty());

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ErrorOccurred { error_message, .. } => {
                assert!(error_message.contains("timed out"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::AgentFinished { status, iterations, .. } => {
                assert_eq!(status, "errored");
                assert_eq!(*iterations, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    struct PanickingProvider;

    #[async_trait::async_trait]
    impl Provider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<cloudpilot_core::Completion, cloudpilot_core::ProviderError> {
            panic!("model exploded")
        }
    }

    #[tokio::test]
    async fn provider_panic_is_errored() {
        let f = fixture(Arc::new(PanickingProvider));
        let mut rx = f.events.subscribe();

        let run = f.orchestrator.run("q", "s1", &RequestScope::default()).await;

        assert_eq!(run.status, RunStatus::Errored);
        assert_eq!(run.answer, "Agent error: model exploded");
        assert!(f.memory.history("s1").await.is_empty());
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ErrorOccurred { context, error_message, .. } => {
                assert_eq!(context, "react completion");
                assert_eq!(error_message, "model exploded");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_panic_is_errored() {
        let provider = Arc::new(SequentialMockProvider::single_text(
            "Action: list_s3_buckets\nAction Input: panic",
        ));
        let f = fixture(provider.clone());

        let run = f.orchestrator.run("q", "s1", &RequestScope::default()).await;

        assert_eq!(run.status, RunStatus::Errored);
        assert_eq!(run.answer, "Agent error: list_s3_buckets blew up");
        assert_eq!(run.tool_calls, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn degraded_identity_is_reported() {
        let provider = Arc::new(SequentialMockProvider::new([
            "Action: list_s3_buckets\nAction Input: ",
            "Final Answer: done",
        ]));
        let f = fixture(provider);
        let run = f
            .orchestrator
            .run("buckets", "s1", &RequestScope::for_account(Some("999999999999".into())))
            .await;
        assert!(run.degraded_identity);
    }

    #[tokio::test]
    async fn history_feeds_next_prompt() {
        let provider = Arc::new(SequentialMockProvider::single_text("Final Answer: ok"));
        let f = fixture(provider.clone());
        f.orchestrator.run("first", "s1", &RequestScope::default()).await;
        f.orchestrator.run("second", "s1", &RequestScope::default()).await;
        f.orchestrator.run("elsewhere", "s2", &RequestScope::default()).await;

        let prompts = provider.requests();
        assert!(prompts[1].prompt.contains("Human: first\nAI: ok"));
        assert!(!prompts[2].prompt.contains("Human: first"));
    }
}
