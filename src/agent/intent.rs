//! Intent classification.
//!
//! Every incoming user message is classified into one label from a closed
//! set before generation. The classifier runs the model deterministically
//! (temperature 0) and treats anything it cannot parse as `General`, so a
//! misbehaving model can never take the conversation down.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, LlmClient};

use super::error::AgentError;
use super::prompt::build_classification_prompt;

/// What the user's latest message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    General,
    Search,
    Greeting,
    Accommodation,
    Destination,
    Transportation,
    Activities,
    GenerateItinerary,
    SaveItinerary,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::General,
        Intent::Search,
        Intent::Greeting,
        Intent::Accommodation,
        Intent::Destination,
        Intent::Transportation,
        Intent::Activities,
        Intent::GenerateItinerary,
        Intent::SaveItinerary,
    ];

    /// Wire label, as presented to and expected from the classifier model.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::General => "general",
            Intent::Search => "search",
            Intent::Greeting => "greeting",
            Intent::Accommodation => "accommodation",
            Intent::Destination => "destination",
            Intent::Transportation => "transportation",
            Intent::Activities => "activities",
            Intent::GenerateItinerary => "generate_itinerary",
            Intent::SaveItinerary => "save_itinerary",
        }
    }

    /// Parse a label. Returns `None` for anything outside the closed set.
    pub fn parse(label: &str) -> Option<Intent> {
        Intent::ALL.iter().copied().find(|i| i.label() == label)
    }
}

/// Marker label the model may emit for elliptical follow-ups
/// ("tiếp tục", "ok làm đi") that carry no intent of their own.
const VAGUE_LABEL: &str = "vague";

/// LLM-backed intent classifier.
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, model: String) -> Self {
        Self { llm, model }
    }

    /// Classify the latest user message.
    ///
    /// `previous` is the most recent classification on this thread, used to
    /// resolve vague follow-ups. A transport failure is returned as
    /// `AgentError::Classification`; the turn runner falls back to
    /// `Intent::General` rather than aborting the conversation.
    pub async fn classify(
        &self,
        history: &[ChatMessage],
        latest: &str,
        previous: Option<Intent>,
    ) -> Result<Intent, AgentError> {
        let prompt = build_classification_prompt(history);
        let messages = vec![ChatMessage::system(prompt), ChatMessage::user(latest)];

        let response = self
            .llm
            .chat_completion(&self.model, &messages, None, 0.0)
            .await
            .map_err(AgentError::Classification)?;

        let raw = response.content.unwrap_or_default();
        let intent = resolve_label(&raw, previous);
        tracing::debug!(raw = %raw.trim(), intent = intent.label(), "classified intent");
        Ok(intent)
    }
}

/// Map raw model output onto the closed enum.
///
/// `vague` resolves to the previous intent; anything out-of-enum (including
/// empty output) resolves to `General`.
fn resolve_label(raw: &str, previous: Option<Intent>) -> Intent {
    let label = raw.trim().trim_matches('"').trim_end_matches('.').to_lowercase();

    if label == VAGUE_LABEL {
        return previous.unwrap_or(Intent::General);
    }

    Intent::parse(&label).unwrap_or(Intent::General)
}
