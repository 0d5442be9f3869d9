//! # Slidesmith Core
//!
//! Domain types, traits, and error definitions for the slidesmith
//! orchestration core. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external seam is defined as a trait here: the model-call primitive
//! ([`Provider`]), the workspace mutation seam ([`ToolExecutor`]), and the
//! always-fresh session accessor ([`SessionSource`]). Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod journal;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SessionError, ToolError};
pub use event::{DomainEvent, EventBus, ResearchStatus};
pub use journal::{DecisionJournal, JournalEntry};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{
    LANES, Note, NoteColor, NoteKind, NoteLink, Session, SessionId, SessionSource, SharedSession,
    Stage, lane_fill_status,
};
pub use tool::{INTERRUPT_TOOL, RESEARCH_TOOL, ToolDispatch, ToolExecutor, ToolRoute};
