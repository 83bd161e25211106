//! # Trip Agent
//!
//! A conversational trip-planning assistant for Vietnamese travel.
//!
//! This library provides:
//! - An HTTP API for chat turns and conversation-thread management
//! - An intent-routed agent loop with tool calling
//! - Integration with OpenRouter for LLM access
//!
//! ## Architecture
//!
//! Each user turn runs a bounded state machine:
//! 1. Classify the message into a closed intent set (deterministic model call)
//! 2. Select the matching system prompt
//! 3. Generate a reply with tool schemas attached
//! 4. Execute requested tools (web search, itinerary save) and feed results back
//! 5. Terminate on a final assistant message or the round limit
//!
//! ## Example
//!
//! ```rust,ignore
//! use trip_agent::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod store;
pub mod tools;

pub use config::Config;
