//! # CloudPilot Core
//!
//! Domain types, traits, and error definitions for the CloudPilot
//! control-plane assistant. This crate has **no transport dependencies**:
//! it defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`]: text completion (the language model)
//! - [`Retriever`]: similarity search over documentation
//! - [`CloudApi`]: invoke a cloud operation under an [`Identity`]
//! - [`RoleAssumer`] / [`IdentityResolver`]: per-request credential scoping
//!
//! Implementations live in their respective crates, which keeps resolution
//! cycles testable with scripted stand-ins.

pub mod action;
pub mod cloud;
pub mod error;
pub mod event;
pub mod identity;
pub mod provider;
pub mod retrieval;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use action::Action;
pub use cloud::{CloudApi, CloudRequest};
pub use error::{CloudError, Error, ProviderError, Result, RetrievalError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use identity::{Credentials, Identity, IdentityResolver, IdentitySource, RoleAssumer};
pub use provider::{Completion, CompletionRequest, Provider};
pub use retrieval::Retriever;
pub use tool::{FailureKind, Tool, ToolCall, ToolDefinition, ToolInput, ToolOutcome, ToolOutput, ToolRegistry};
