//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::Intent;
use crate::llm::{ChatMessage, Role};
use crate::store::ThreadSummary;

/// Request to send one chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Caller-asserted user identifier (authentication happens upstream)
    pub user_id: String,

    /// The user's message text
    pub message: String,

    /// Existing thread to continue; omitted on the first message
    pub thread_id: Option<Uuid>,
}

/// Response to a chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Thread the turn ran on (echoed from the request on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,

    /// Assistant reply, or the generic apology on failure
    pub reply: String,

    /// Classified intent of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

/// Query parameters for thread endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadQuery {
    pub user_id: String,
}

/// Response listing a user's threads.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadListResponse {
    pub threads: Vec<ThreadSummary>,
}

/// One rendered message of a thread (tool plumbing is filtered out).
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub role: String,

    pub content: String,
}

impl MessageView {
    /// Render a wire message for display, `None` for tool-plumbing turns.
    pub fn from_message(message: &ChatMessage) -> Option<Self> {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System | Role::Tool => return None,
        };
        // Assistant messages that only carry tool calls have no text.
        let content = message.content.clone().filter(|c| !c.is_empty())?;
        Some(Self {
            role: role.to_string(),
            content,
        })
    }
}

/// Full thread detail.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadResponse {
    pub id: Uuid,

    pub created_at: String,

    pub messages: Vec<MessageView>,
}

/// Error payload for client-visible failures.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
