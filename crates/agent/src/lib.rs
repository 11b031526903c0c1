//! The CloudPilot resolution cycle.
//!
//! A command takes one of two paths:
//!
//! 1. **Direct**: resolve one [`Action`](cloudpilot_core::Action) (keyword
//!    rules first, the model second), extract its argument, run one tool.
//! 2. **Agent**: the ReAct [`Orchestrator`] reasons step by step, calling
//!    zero or more tools until it produces a final answer or spends its
//!    step budget.
//!
//! Both paths dispatch through the [`ScopedInvoker`], which resolves a
//! fresh identity for the request's account on every tool call.

pub mod direct;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod extract;
pub mod intent;
pub mod react;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use direct::{DirectExecutor, DirectRun};
pub use dispatch::{Invocation, RequestScope, ScopedInvoker};
pub use engine::{CommandEngine, CommandRequest, CommandResponse, Mode};
pub use error::ExecuteError;
pub use intent::{IntentResolver, Resolution, Tier};
pub use react::{AgentRun, Orchestrator, RunStatus};
