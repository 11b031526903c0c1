//! Audit logging: structured security event logging.
//!
//! Records credential scoping decisions and configuration writes so an
//! operator can tell which identity a call really ran as.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub target: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable security events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Temporary credentials were obtained for a target account
    RoleAssumed { account_id: String, role_arn: String },
    /// Role assumption failed; the call ran as the default identity (or none)
    CredentialFallback { account_id: String, service: String },
    /// A production write was refused pending human approval
    ApprovalRequired { parameter: String },
    /// A configuration parameter was written
    ParameterWritten { parameter: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    /// Proceeded with reduced guarantees (e.g. wrong account scope)
    Degraded,
    Denied,
    Failure,
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Keeps the most recent entries in memory and forwards every entry to
/// its sinks.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: 1000,
            sinks,
        }
    }

    /// Logger that writes through `tracing`.
    pub fn tracing() -> Self {
        Self::with_sinks(vec![Box::new(TracingSink)])
    }

    /// Retain at most `capacity` entries in memory.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        // A panicked writer cannot leave a half-pushed entry behind.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an audit event.
    pub fn log(
        &self,
        event: AuditEvent,
        actor: &str,
        target: &str,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            target: target.into(),
            outcome,
            details,
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }

        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| &e.outcome == outcome)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink. Degraded and denied outcomes log at warn.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        match entry.outcome {
            AuditOutcome::Success => tracing::info!(
                event = ?entry.event,
                actor = %entry.actor,
                target = %entry.target,
                details = ?entry.details,
                "AUDIT"
            ),
            _ => tracing::warn!(
                event = ?entry.event,
                actor = %entry.actor,
                target = %entry.target,
                outcome = ?entry.outcome,
                details = ?entry.details,
                "AUDIT"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fallback(account: &str) -> AuditEvent {
        AuditEvent::CredentialFallback {
            account_id: account.into(),
            service: "s3".into(),
        }
    }

    #[test]
    fn log_and_filter_by_outcome() {
        let logger = AuditLogger::new();
        logger.log(
            AuditEvent::RoleAssumed {
                account_id: "123456789012".into(),
                role_arn: "arn:aws:iam::123456789012:role/CloudAgentAccessRole".into(),
            },
            "broker",
            "s3",
            AuditOutcome::Success,
            None,
        );
        logger.log(
            fallback("210987654321"),
            "broker",
            "s3",
            AuditOutcome::Degraded,
            Some("AccessDenied".into()),
        );

        assert_eq!(logger.count(), 2);
        let degraded = logger.entries_by_outcome(&AuditOutcome::Degraded);
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].details.as_deref(), Some("AccessDenied"));
    }

    #[test]
    fn capacity_bounds_memory() {
        let logger = AuditLogger::new().with_capacity(3);
        for i in 0..5 {
            logger.log(fallback(&i.to_string()), "broker", "s3", AuditOutcome::Degraded, None);
        }
        let entries = logger.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].event, fallback("2"));
        logger.clear();
        assert_eq!(logger.count(), 0);
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_value(AuditEvent::ApprovalRequired {
            parameter: "/prod/app/DB_HOST".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "approval_required");
    }

    #[test]
    fn custom_sink_receives_events() {
        struct TestSink {
            received: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for TestSink {
            fn record(&self, entry: &AuditEntry) {
                self.received.lock().unwrap().push(entry.target.clone());
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let logger = AuditLogger::with_sinks(vec![Box::new(TestSink {
            received: received.clone(),
        })]);
        logger.log(
            AuditEvent::ParameterWritten {
                parameter: "/staging/app/X".into(),
            },
            "put_ssm_parameter",
            "/staging/app/X",
            AuditOutcome::Success,
            None,
        );

        assert_eq!(received.lock().unwrap().as_slice(), ["/staging/app/X"]);
    }

    #[test]
    fn debug_format() {
        let debug_str = format!("{:?}", AuditLogger::tracing());
        assert!(debug_str.contains("sink_count: 1"));
    }
}
