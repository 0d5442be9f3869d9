//! Declarative tool catalog for the slidesmith copilot.
//!
//! These are the actions the LLM can take during the ideation
//! conversation. The catalog only *describes* tools — execution happens in
//! the caller's executor, which owns the session workspace. The two
//! reserved names (`ask_user`, `research`) are routed by the orchestrator
//! itself.

pub mod canvas;
pub mod names;

pub use canvas::canvas_catalog;
