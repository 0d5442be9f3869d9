//! The ideation session — the shared mutable workspace the copilot builds.
//!
//! A session is a canvas of sticky notes in five narrative lanes, plus the
//! conversation history with the copilot. Sessions are **externally owned**:
//! the orchestration core never creates or destroys a live session, it only
//! observes snapshots through [`SessionSource`] and mutates state through
//! the caller's tool executor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::message::Message;

/// The five narrative lanes of the canvas, in presentation order.
pub const LANES: [&str; 5] = ["Hook", "Problem", "Solution", "Proof", "CTA"];

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stages of the ideation process (drives the system prompt guidance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discover,
    Expand,
    Structure,
    Ready,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Discover => "discover",
            Stage::Expand => "expand",
            Stage::Structure => "structure",
            Stage::Ready => "ready",
        };
        write!(f, "{s}")
    }
}

/// Where a note came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    User,
    Agent,
    Research,
}

/// Note colors for visual categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    /// User ideas
    Yellow,
    /// AI suggestions
    Blue,
    /// Research findings
    Green,
    /// Questions / unknowns
    Pink,
    /// Key insights
    Purple,
}

/// A single sticky note on the canvas.
///
/// Flat structure — connections via `parent_id`, position via lane/row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub kind: NoteKind,

    /// URL source for research notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Title of the research source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,

    /// ID of parent note (for connectors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// 0-4 index into [`LANES`]
    pub lane: usize,

    /// Vertical position within the lane
    pub row: u32,

    pub color: NoteColor,

    /// User has confirmed this note
    pub approved: bool,

    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Create a new note. User notes are auto-approved.
    pub fn new(content: impl Into<String>, lane: usize, kind: NoteKind, color: NoteColor) -> Self {
        Self {
            id: format!("note-{}", Uuid::new_v4()),
            content: content.into(),
            kind,
            source_url: None,
            source_title: None,
            parent_id: None,
            lane,
            row: 0,
            color,
            approved: kind == NoteKind::User,
            created_at: Utc::now(),
        }
    }
}

/// Connection between two notes (for explicit multi-parent relationships).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteLink {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
}

/// The full state of an ideation canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub topic: String,
    pub notes: Vec<Note>,
    /// Additional connections beyond parent links
    pub links: Vec<NoteLink>,
    /// Conversation history with the copilot
    pub messages: Vec<Message>,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session for a topic.
    pub fn new(topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            topic: topic.into(),
            notes: Vec::new(),
            links: Vec::new(),
            messages: Vec::new(),
            stage: Stage::Discover,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a note, touching the updated timestamp.
    pub fn push_note(&mut self, note: Note) {
        self.updated_at = Utc::now();
        self.notes.push(note);
    }

    /// Add a message to the conversation history.
    pub fn push_message(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }
}

/// How many notes each lane holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneStatus {
    pub name: &'static str,
    pub count: usize,
}

/// Count notes per lane, in lane order.
pub fn lane_fill_status(notes: &[Note]) -> Vec<LaneStatus> {
    LANES
        .iter()
        .enumerate()
        .map(|(idx, name)| LaneStatus {
            name,
            count: notes.iter().filter(|n| n.lane == idx).count(),
        })
        .collect()
}

/// Read access to an externally-owned session.
///
/// Contract: `snapshot` must always return the **freshest** state. The
/// orchestrator re-reads rather than caching across suspension points —
/// an earlier tool invocation in the same turn may have mutated state a
/// later step depends on.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn snapshot(&self) -> Session;
}

/// A shared, lock-guarded session — the simplest [`SessionSource`].
///
/// Writes through [`SharedSession::update`] are visible to the very next
/// `snapshot`, which is what the freshness contract requires.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Mutate the session in place.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Session) + Send,
    {
        let mut guard = self.inner.write().await;
        f(&mut guard);
        guard.updated_at = Utc::now();
    }
}

#[async_trait]
impl SessionSource for SharedSession {
    async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }
}
