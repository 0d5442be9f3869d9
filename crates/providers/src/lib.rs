//! LLM provider implementations for slidesmith.
//!
//! The vast majority of hosted LLMs expose an OpenAI-compatible
//! `/v1/chat/completions` endpoint, so a single implementation covers the
//! orchestration model, the refinement judge model, and the enhanced
//! research backend — they differ only in base URL, key, and model name.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
