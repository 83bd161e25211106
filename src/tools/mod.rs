//! Tool framework for the agent.
//!
//! Each tool declares a JSON-schema parameter contract that is handed to
//! the model; the registry dispatches requested calls by name. Tool
//! failures are returned as `Err` here and flattened into failure-text
//! results by the turn runner, so the model always sees one result per
//! call.

mod itinerary;
mod web;

pub use itinerary::SaveItinerary;
pub use web::WebSearch;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::ItineraryStore;

/// Per-turn context available to tool implementations.
///
/// The user id is caller-asserted by the web layer and is authoritative
/// for any persistence the tool performs.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: String,
}

/// A callable tool exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's argument object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String>;
}

/// Tool name and description, for prompt construction.
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// The fixed set of tools available to the agent.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Build the registry with its persistence collaborator injected.
    pub fn new(itinerary_store: Arc<dyn ItineraryStore>) -> Self {
        Self::with_tools(vec![
            Box::new(WebSearch::new()),
            Box::new(SaveItinerary::new(itinerary_store)),
        ])
    }

    /// Build a registry from an explicit tool set.
    pub fn with_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// List registered tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Tool schemas in the chat-completions `tools` format.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> anyhow::Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryItineraryStore;

    #[tokio::test]
    async fn registry_exposes_both_tools() {
        let registry = ToolRegistry::new(Arc::new(InMemoryItineraryStore::new()));
        let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["web_search", "save_itinerary"]);

        let schemas = registry.get_tool_schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[1]["function"]["name"], "save_itinerary");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new(Arc::new(InMemoryItineraryStore::new()));
        let ctx = ToolContext {
            user_id: "user-1".to_string(),
        };
        let err = registry
            .execute("book_flight", serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }
}
