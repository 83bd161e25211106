//! Agent module - the conversational trip-planning core.
//!
//! One user turn runs a small state machine:
//! 1. Classify the latest message into a closed intent set
//! 2. Select the system prompt for that intent
//! 3. Call the LLM with full history and the tool schemas
//! 4. If the model requests tools, execute them in order and loop
//! 5. Stop at a final assistant message or the round limit

mod error;
mod intent;
mod prompt;
mod turn;

pub use error::AgentError;
pub use intent::{Intent, IntentClassifier};
pub use prompt::{build_classification_prompt, build_system_prompt, system_prompt, FALLBACK_REPLY};
pub use turn::{Agent, TurnOutcome};
