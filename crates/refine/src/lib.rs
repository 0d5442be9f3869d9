//! Iterative image-prompt refinement for slidesmith.
//!
//! Slide image prompts drift: a deck about pet gifts ends up with generic
//! perfume-bottle imagery. The engine fixes that with a per-item loop:
//!
//! 1. **Validate** the prompt against the presentation topic (scored 0-100)
//! 2. If it fails, **rewrite** it to fix the reported issues while keeping
//!    the visual style
//! 3. Repeat until the prompt passes or the iteration budget runs out, then
//!    accept the best-scoring candidate seen
//!
//! Items are independent and refine in parallel; output order always
//! matches input order. Topic keywords are extracted once per run and
//! shared across items so validation judgments stay consistent.

pub mod engine;
pub mod judge;
pub mod parse;

use thiserror::Error;

pub use engine::{
    ItemOutcome, RefineAction, RefineEngine, RefineLog, RefineOptions, RefineReport, SlideBrief,
};
pub use judge::{
    ModelJudge, PromptJudge, Rewrite, RewriteRequest, TopicKeywords, Validation, ValidationRequest,
};

/// Errors from the refinement primitives.
///
/// The engine itself never surfaces these — every primitive failure is
/// recovered locally (synthetic failed validation, best-seen finalize,
/// keyword fallback) and shows up only in the run's logs.
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("Model call failed: {0}")]
    ModelCall(#[from] slidesmith_core::error::ProviderError),

    #[error("Malformed judge reply: {0}")]
    MalformedReply(String),
}
