//! Tool dispatch contracts — how model tool calls reach the workspace.
//!
//! The model sees a declarative catalog of [`crate::provider::ToolDefinition`]s
//! and replies with tool calls. Two names are reserved and routed by the
//! orchestrator itself; every other call is delegated verbatim to the
//! caller's [`ToolExecutor`], which is the only sanctioned way to mutate
//! session state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Reserved tool name: pauses the loop and surfaces a question to the user.
pub const INTERRUPT_TOOL: &str = "ask_user";

/// Reserved tool name: routed through the research gateway.
pub const RESEARCH_TOOL: &str = "research";

/// Where a tool call is routed.
///
/// A closed set — the two reserved identifiers are orchestrator-owned and
/// cannot be overridden by a catalog; everything else goes to the caller's
/// executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRoute {
    /// Terminal, human-facing: halts the remaining calls in the turn.
    Interrupt,
    /// Provider-selecting research, handled by the gateway.
    Research,
    /// Delegated verbatim to the caller's executor — the mutation seam.
    Workspace,
}

impl ToolRoute {
    /// Classify a tool name.
    pub fn of(name: &str) -> Self {
        match name {
            INTERRUPT_TOOL => Self::Interrupt,
            RESEARCH_TOOL => Self::Research,
            _ => Self::Workspace,
        }
    }
}

/// A dispatched tool invocation with its recorded result.
///
/// Exactly one of these is recorded per invocation the orchestrator
/// dispatches, including the interrupt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDispatch {
    pub name: String,
    pub args: serde_json::Value,
    pub result: serde_json::Value,
}

/// The workspace mutation seam.
///
/// The executor is supplied by the session owner. Its side effects are the
/// only sanctioned way to mutate session state during a turn.
///
/// Convention: ordinary failures — including an unknown tool name — are
/// returned as structured values (see [`failure_value`]) so the loop
/// continues and the model can react. `Err` is reserved for infrastructure
/// faults and aborts the run the same way a model-call failure does.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

/// Build the structured failure value executors return for ordinary errors.
pub fn failure_value(name: &str, reason: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "tool": name,
        "error": reason.into(),
    })
}
