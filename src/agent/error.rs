//! Agent error taxonomy.

use thiserror::Error;
use uuid::Uuid;

use crate::llm::LlmError;
use crate::store::StoreError;

/// Errors that can escape a turn.
///
/// Classification failures are recovered inside the turn (fallback to the
/// general intent) and tool failures are flattened into failure-text tool
/// results, so in practice callers observe `Generation`, `ThreadNotFound`
/// and `Store`.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Intent classification failed: {0}")]
    Classification(#[source] LlmError),

    #[error("Response generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Thread {0} not found")]
    ThreadNotFound(Uuid),

    #[error("Storage failure: {0}")]
    Store(String),
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ThreadNotFound(id) => AgentError::ThreadNotFound(id),
            StoreError::Database(message) => AgentError::Store(message),
        }
    }
}
