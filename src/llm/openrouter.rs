//! OpenRouter chat-completions client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{ChatMessage, LlmClient, LlmError};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Client for the OpenRouter API (OpenAI-compatible).
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl OpenRouterClient {
    /// Create a new client. `timeout` bounds every completion call; an
    /// elapsed timeout surfaces as `LlmError::Http`.
    pub fn new(api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            base_url: OPENROUTER_URL.to_string(),
        }
    }

    /// Override the endpoint URL (testing against a local mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[serde_json::Value]>,
        temperature: f32,
    ) -> Result<ChatMessage, LlmError> {
        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
        });

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools);
            }
        }

        tracing::debug!(model, temperature, "calling chat completion");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::MalformedResponse("response has no choices".to_string()))
    }
}
