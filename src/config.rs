//! Configuration management for the trip agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `CHAT_MODEL` - Optional. Model used for response generation. Defaults to `openai/gpt-4o-mini`.
//! - `CLASSIFIER_MODEL` - Optional. Model used for intent classification. Defaults to the chat model.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_TOOL_ROUNDS` - Optional. Maximum generate/tool round trips per turn. Defaults to `5`.
//! - `LLM_TIMEOUT_SECS` - Optional. Timeout for each model/tool HTTP call. Defaults to `60`.
//! - `DB_PATH` - Optional. SQLite file for threads and itineraries. In-memory stores when unset.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Model used for response generation (OpenRouter format)
    pub chat_model: String,

    /// Model used for intent classification
    pub classifier_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum generate/tool round trips within one turn
    pub max_tool_rounds: usize,

    /// Timeout for each outbound HTTP call, in seconds
    pub llm_timeout_secs: u64,

    /// SQLite database path; `None` selects in-memory stores
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let classifier_model =
            std::env::var("CLASSIFIER_MODEL").unwrap_or_else(|_| chat_model.clone());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_tool_rounds = std::env::var("MAX_TOOL_ROUNDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_TOOL_ROUNDS".to_string(), format!("{}", e))
            })?;

        let llm_timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("LLM_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let db_path = std::env::var("DB_PATH").ok().map(PathBuf::from);

        Ok(Self {
            api_key,
            chat_model,
            classifier_model,
            host,
            port,
            max_tool_rounds,
            llm_timeout_secs,
            db_path,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, chat_model: String) -> Self {
        Self {
            api_key,
            classifier_model: chat_model.clone(),
            chat_model,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_tool_rounds: 5,
            llm_timeout_secs: 60,
            db_path: None,
        }
    }
}
