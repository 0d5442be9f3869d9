//! Lenient parsing of model JSON replies.
//!
//! Models asked for "ONLY valid JSON" still wrap replies in markdown fences
//! often enough that every judge call strips them before deserializing.

use serde::de::DeserializeOwned;

use crate::RefineError;

/// Parse a JSON reply, tolerating ```json fences and surrounding noise.
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Result<T, RefineError> {
    let cleaned = content.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    serde_json::from_str(cleaned)
        .map_err(|e| RefineError::MalformedReply(format!("{e}: {}", preview(cleaned))))
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}
