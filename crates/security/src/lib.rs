//! Security for CloudPilot: credential scoping, write approval and audit.
//!
//! Provides:
//! - **Credential broker**: per-request role assumption with an audited fallback
//! - **Approval policy**: production configuration writes need a human
//! - **Audit logging**: structured security event logging

pub mod approval;
pub mod audit;
pub mod broker;

pub use approval::ApprovalPolicy;
pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use broker::CredentialBroker;
