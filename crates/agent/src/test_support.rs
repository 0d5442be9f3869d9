//! Shared test helpers for orchestrator and gateway tests.

use async_trait::async_trait;
use slidesmith_core::error::{ProviderError, ToolError};
use slidesmith_core::message::{Message, MessageToolCall};
use slidesmith_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use slidesmith_core::session::SharedSession;
use slidesmith_core::tool::ToolExecutor;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue. The last
/// response repeats once the queue is exhausted (convenient for
/// max-iteration tests); an empty queue means every call fails.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    call_count: Mutex<usize>,
    repeat_last: bool,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            repeat_last: false,
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(
        tool_calls: Vec<MessageToolCall>,
        thought: &str,
        answer: &str,
    ) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    /// Every `complete` call fails with a network error.
    pub fn always_failing() -> Self {
        Self::new(vec![])
    }

    /// Repeat the final scripted response forever instead of panicking.
    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if responses.is_empty() {
            *count += 1;
            return Err(ProviderError::Network("mock provider offline".into()));
        }

        let index = if *count >= responses.len() {
            if !self.repeat_last {
                panic!(
                    "SequentialMockProvider: no more responses (call #{}, have {})",
                    *count,
                    responses.len()
                );
            }
            responses.len() - 1
        } else {
            *count
        };

        let response = responses[index].clone();
        *count += 1;
        Ok(response)
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// An executor that records every call and applies simple canvas mutations
/// to a [`SharedSession`], so fresh snapshots observe the turn's effects.
pub struct RecordingExecutor {
    session: SharedSession,
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    /// Tool names the executor pretends not to know.
    unknown: Vec<String>,
    /// Tool names whose execution raises an infrastructure fault.
    faulty: Vec<String>,
}

impl RecordingExecutor {
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            calls: Mutex::new(Vec::new()),
            unknown: Vec::new(),
            faulty: Vec::new(),
        }
    }

    pub fn with_unknown(mut self, name: &str) -> Self {
        self.unknown.push(name.into());
        self
    }

    pub fn with_fault(mut self, name: &str) -> Self {
        self.faulty.push(name.into());
        self
    }

    pub fn recorded_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.calls.lock().unwrap().push((name.to_string(), args.clone()));

        if self.faulty.iter().any(|n| n == name) {
            return Err(ToolError::ExecutionFailed {
                tool_name: name.into(),
                reason: "mock infrastructure fault".into(),
            });
        }
        if self.unknown.iter().any(|n| n == name) {
            return Ok(slidesmith_core::tool::failure_value(
                name,
                format!("unknown tool: {name}"),
            ));
        }

        match name {
            "set_topic" => {
                let topic = args["topic"].as_str().unwrap_or_default().to_string();
                self.session.update(|s| s.topic = topic).await;
            }
            "create_note" => {
                use slidesmith_core::session::{Note, NoteColor, NoteKind};
                let content = args["content"].as_str().unwrap_or_default().to_string();
                let lane = match args["lane"].as_str().unwrap_or("hook") {
                    "problem" => 1,
                    "solution" => 2,
                    "proof" => 3,
                    "cta" => 4,
                    _ => 0,
                };
                self.session
                    .update(move |s| {
                        s.push_note(Note::new(content, lane, NoteKind::Agent, NoteColor::Blue))
                    })
                    .await;
            }
            _ => {}
        }

        Ok(serde_json::json!({"success": true, "tool": name}))
    }
}
