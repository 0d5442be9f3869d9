//! The conversation orchestrator — the heart of slidesmith.
//!
//! The copilot follows a multi-turn tool-calling cycle:
//!
//! 1. **Receive** a user message
//! 2. **Build context** (stage-aware system prompt + session history)
//! 3. **Send to the LLM** via the configured provider
//! 4. **If tool calls**: dispatch them in request order, feed results back,
//!    loop back to step 3
//! 5. **If text only**: the turn is done
//!
//! The loop continues until the model responds with text only, the model
//! asks the user a question (interrupt), or the iteration limit is reached.
//! After the loop, a completion heuristic decides whether to prompt the
//! user with next steps.

pub mod completion;
pub mod orchestrator;
pub mod prompts;
pub mod research;

#[cfg(test)]
pub(crate) mod test_support;

pub use completion::{Assessment, CompletionPrompt, assess, completion_prompt};
pub use orchestrator::{InterruptQuestion, Orchestrator, TurnResponse};
pub use prompts::{CanvasPromptBuilder, PromptBuilder};
pub use research::{Finding, ResearchGateway, ResearchOutcome};
