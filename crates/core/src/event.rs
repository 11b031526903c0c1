//! Domain event system: decoupled observation of resolution cycles.
//!
//! Events are published when an intent is resolved, a tool runs, or an
//! agent run finishes. Subscribers (logging, tests) react without the
//! engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::action::Action;
use crate::tool::FailureKind;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A query was mapped to an action
    IntentResolved {
        action: Action,
        /// "rule" or "model"
        tier: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolExecuted {
        tool_name: String,
        failure: Option<FailureKind>,
        degraded_identity: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An orchestration run ended
    AgentFinished {
        session_id: String,
        /// "done", "aborted" or "errored"
        status: String,
        iterations: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
