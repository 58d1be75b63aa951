//! Memory trait: bounded, per-session knowledge about the user.
//!
//! Two independent collections:
//! - **notes**: short free-form facts ("prefers Ukrainian", "learning Slovak")
//! - **history**: the most recent user/assistant turns
//!
//! Both are capacity-bounded and evict oldest-first. Reads return owned
//! snapshots, so callers can never mutate the store behind its back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::MemoryError;
use crate::message::{Message, Role};

/// A single remembered fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNote {
    /// Unique ID for this note
    pub id: String,

    /// The note text
    pub text: String,

    /// Free-form metadata (source, tags, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// When this note was added
    pub created_at: DateTime<Utc>,
}

impl MemoryNote {
    pub fn new(text: impl Into<String>, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// One prior conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), timestamp: Utc::now() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp: Utc::now() }
    }

    /// Convert into a message for replay to the provider.
    pub fn to_message(&self) -> Message {
        match self.role {
            Role::Assistant => Message::assistant(self.content.clone()),
            Role::System => Message::system(self.content.clone()),
            Role::User | Role::Tool => Message::user(self.content.clone()),
        }
    }
}

/// Capacity limits for a memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLimits {
    pub max_notes: usize,
    pub max_history: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self { max_notes: 20, max_history: 50 }
    }
}

/// The core memory store trait.
///
/// Implementations: in-process (volatile). A persistent backend would
/// implement the same surface.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    fn limits(&self) -> MemoryLimits;

    /// Append a turn, evicting the oldest beyond capacity.
    async fn add_history(&self, turn: HistoryTurn) -> std::result::Result<(), MemoryError>;

    /// Append a note, evicting the oldest beyond capacity. Returns the stored note.
    async fn add_note(
        &self,
        text: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<MemoryNote, MemoryError>;

    /// Snapshot of the notes, oldest first.
    async fn notes(&self) -> Vec<MemoryNote>;

    /// Snapshot of the history, oldest first.
    async fn history(&self) -> Vec<HistoryTurn>;

    /// Remove a note by ID, or by case-insensitive text match.
    /// Returns whether anything was removed.
    async fn remove_note(&self, id_or_text: &str) -> std::result::Result<bool, MemoryError>;

    async fn clear_notes(&self) -> std::result::Result<(), MemoryError>;

    async fn clear_history(&self) -> std::result::Result<(), MemoryError>;

    /// Clear notes and history.
    async fn clear(&self) -> std::result::Result<(), MemoryError> {
        self.clear_notes().await?;
        self.clear_history().await
    }
}
