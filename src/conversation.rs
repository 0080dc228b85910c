//! In-memory conversation state: the transcript and session identity.
//!
//! Nothing here is persisted. A session lives from process start (or the
//! last memory-clear) until the next memory-clear, which empties the
//! transcript and issues a new session id.

use crate::backend::{Turn, TurnRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Number of transcript entries surfaced to viewers.
pub const VISIBLE_WINDOW: usize = 10;

/// Characters of message text kept in a memory preview line.
pub const PREVIEW_CHARS: usize = 50;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person seeking support.
    User,
    /// The assistant, including canned crisis and fallback replies.
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// A single immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh id, stamped now.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an agent message.
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, text)
    }

    /// Map this entry to the backend's turn format.
    pub fn to_turn(&self) -> Turn {
        let role = match self.role {
            Role::User => TurnRole::User,
            Role::Agent => TurnRole::Model,
        };
        Turn::new(role, self.text.clone())
    }
}

/// A shortened transcript line for the memory panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub id: Uuid,
    /// `You:` or `Sahayak:`.
    pub label: &'static str,
    pub preview: String,
}

/// The single active conversation.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    session_id: Uuid,
    transcript: Vec<Message>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Start a new, empty session.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            transcript: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The full transcript in insertion order.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// The last [`VISIBLE_WINDOW`] entries.
    pub fn visible(&self) -> &[Message] {
        let start = self.transcript.len().saturating_sub(VISIBLE_WINDOW);
        &self.transcript[start..]
    }

    /// Labelled, shortened lines for the visible window.
    pub fn memory_preview(&self) -> Vec<MemoryEntry> {
        self.visible()
            .iter()
            .map(|m| MemoryEntry {
                id: m.id,
                label: match m.role {
                    Role::User => "You:",
                    Role::Agent => "Sahayak:",
                },
                preview: preview_text(&m.text),
            })
            .collect()
    }

    /// Transcript mapped to backend turns.
    pub fn to_turns(&self) -> Vec<Turn> {
        self.transcript.iter().map(Message::to_turn).collect()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Empty the transcript and issue a new session id. Returns the new id.
    pub fn clear(&mut self) -> Uuid {
        self.transcript.clear();
        self.session_id = Uuid::new_v4();
        self.session_id
    }
}

fn preview_text(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_owned()
    }
}

/// Conversation state shared between the pipeline and display collaborators.
///
/// The lock is only held for short, synchronous sections and never across an
/// `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedConversation {
    inner: Arc<Mutex<ConversationSession>>,
}

impl SharedConversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with read access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&ConversationSession) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    pub fn session_id(&self) -> Uuid {
        self.with(ConversationSession::session_id)
    }

    /// Clone of the current session.
    pub fn snapshot(&self) -> ConversationSession {
        self.with(|s| s.clone())
    }

    /// Append `message` only if `session_id` is still the active session.
    ///
    /// Returns `false` when the session was cleared in the meantime; the
    /// message is dropped.
    pub fn commit(&self, session_id: Uuid, message: Message) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.session_id != session_id {
            return false;
        }
        guard.push(message);
        true
    }

    /// Backend turns for the transcript, excluding the entry with `exclude`.
    pub fn turns_before(&self, session_id: Uuid, exclude: Uuid) -> Option<Vec<Turn>> {
        self.with(|s| {
            (s.session_id == session_id).then(|| {
                s.transcript
                    .iter()
                    .take_while(|m| m.id != exclude)
                    .map(Message::to_turn)
                    .collect()
            })
        })
    }

    /// Clear the transcript and issue a new session id.
    pub fn clear(&self) -> Uuid {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.clear()
    }
}
