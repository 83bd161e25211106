//! Persistence boundary: conversation threads and saved itineraries.
//!
//! The agent core never touches the database directly; it goes through the
//! [`ThreadStore`] and [`ItineraryStore`] traits so the web layer can pick
//! the backing (in-memory or SQLite) at startup and tests can fake it.

mod memory;
mod sqlite;

pub use memory::{InMemoryItineraryStore, InMemoryThreadStore};
pub use sqlite::{open_database, SqliteItineraryStore, SqliteThreadStore};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::llm::ChatMessage;

/// Current timestamp as RFC 3339 string.
pub(crate) fn now_string() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Thread missing, or owned by a different user. The two cases are
    /// indistinguishable to callers.
    #[error("Thread {0} not found")]
    ThreadNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),
}

/// A persisted conversation between one user and the assistant.
///
/// Messages are append-only and strictly ordered; the full tool-call wire
/// history is retained so a turn can be replayed to the model verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: Uuid,
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: String,
}

/// Thread metadata for listing, without the message bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: Uuid,
    /// First user message, truncated, as a display title
    pub title: Option<String>,
    pub message_count: usize,
    pub created_at: String,
}

/// One activity block within a day (morning/afternoon/evening slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityBlock {
    pub description: String,
    /// Estimated cost in VND
    pub cost: f64,
}

/// A single day of a saved itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub morning: ActivityBlock,
    pub afternoon: ActivityBlock,
    pub evening: ActivityBlock,
}

/// A complete itinerary, inserted wholesale by the save tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub user_id: String,
    pub destination: String,
    /// Free-form duration, e.g. "3 ngày 2 đêm"
    pub duration: String,
    pub days: Vec<ItineraryDay>,
}

/// Conversation thread persistence.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create an empty thread owned by `user_id`.
    async fn create(&self, user_id: &str) -> Result<ConversationThread, StoreError>;

    /// Append one message to the thread's ordered sequence.
    async fn append_message(
        &self,
        thread_id: Uuid,
        message: ChatMessage,
    ) -> Result<(), StoreError>;

    /// Fetch a thread with its full message history. Ownership is checked:
    /// a thread belonging to another user reads as not found.
    async fn get(&self, thread_id: Uuid, user_id: &str) -> Result<ConversationThread, StoreError>;

    /// List thread summaries for a user, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<ThreadSummary>, StoreError>;

    /// Hard-delete a thread. Returns false when nothing was deleted.
    async fn delete(&self, thread_id: Uuid, user_id: &str) -> Result<bool, StoreError>;
}

/// Saved-itinerary persistence.
#[async_trait]
pub trait ItineraryStore: Send + Sync {
    async fn insert(&self, itinerary: &Itinerary) -> Result<(), StoreError>;
}

/// Derive a listing title from the first user message.
pub(crate) fn summary_title(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.role == crate::llm::Role::User)
        .and_then(|m| m.content.as_deref())
        .map(|text| {
            let mut title: String = text.chars().take(60).collect();
            if title.len() < text.len() {
                title.push('…');
            }
            title
        })
}
