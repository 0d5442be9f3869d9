//! The decision journal — an append-only log of agent reasoning.
//!
//! Each entry records one reasoning step: what the agent decided, why, what
//! alternatives it weighed, and which notes or tools the step touched.
//! Entries are never edited or removed once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide sequence so two entries in the same millisecond still get
/// distinct, ordered ids.
static ENTRY_SEQ: AtomicU64 = AtomicU64::new(0);

/// A structured record of a single agent reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique, time-ordered id (`entry-<millis>-<seq>`).
    pub id: String,

    pub timestamp: DateTime<Utc>,

    /// Stage of the session when the step happened ("discover", "deciding", ...)
    pub stage: String,

    /// Short human-readable headline
    pub title: String,

    /// First-person narrative of the reasoning
    pub narrative: String,

    /// What was decided, if the step resolved a choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,

    /// Alternatives that were considered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,

    /// Confidence in the decision, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,

    /// Notes this step created or touched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_note_ids: Vec<String>,

    /// Tools invoked during the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_called: Vec<String>,
}

impl JournalEntry {
    /// Create a new entry with the required fields.
    pub fn new(
        stage: impl Into<String>,
        title: impl Into<String>,
        narrative: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let seq = ENTRY_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("entry-{}-{}", now.timestamp_millis(), seq),
            timestamp: now,
            stage: stage.into(),
            title: title.into(),
            narrative: narrative.into(),
            decision: None,
            alternatives: Vec::new(),
            confidence: None,
            related_note_ids: Vec::new(),
            tools_called: Vec::new(),
        }
    }

    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn with_related_notes(mut self, note_ids: Vec<String>) -> Self {
        self.related_note_ids = note_ids;
        self
    }

    pub fn with_tools_called(mut self, tools: Vec<String>) -> Self {
        self.tools_called = tools;
        self
    }
}

/// An append-only collection of journal entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionJournal {
    entries: Vec<JournalEntry>,

    /// Optional rolled-up summary of the whole journal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl DecisionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; returns a reference to the stored entry.
    pub fn append(&mut self, entry: JournalEntry) -> &JournalEntry {
        self.entries.push(entry);
        self.entries.last().expect("just pushed")
    }

    /// All entries, in append order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
