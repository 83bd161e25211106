//! HTTP API layer.
//!
//! A thin boundary over the agent core: one chat endpoint that runs a
//! turn, plus thread listing/fetching/deletion. Authentication is the
//! upstream middleware's job; this layer trusts the caller-asserted
//! `user_id`.

mod chat;
mod routes;
mod types;

pub use routes::AppState;
pub use types::{ChatRequest, ChatResponse, ThreadListResponse, ThreadResponse};

use std::sync::Arc;
use std::time::Duration;

use crate::agent::Agent;
use crate::config::Config;
use crate::llm::OpenRouterClient;
use crate::store::{
    open_database, InMemoryItineraryStore, InMemoryThreadStore, ItineraryStore,
    SqliteItineraryStore, SqliteThreadStore, ThreadStore,
};

/// Wire up stores, LLM client and agent, then serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let (threads, itineraries): (Arc<dyn ThreadStore>, Arc<dyn ItineraryStore>) =
        match &config.db_path {
            Some(path) => {
                let db = open_database(path)?;
                tracing::info!(path = %path.display(), "using sqlite stores");
                (
                    Arc::new(SqliteThreadStore::new(db.clone())),
                    Arc::new(SqliteItineraryStore::new(db)),
                )
            }
            None => {
                tracing::info!("using in-memory stores");
                (
                    Arc::new(InMemoryThreadStore::new()),
                    Arc::new(InMemoryItineraryStore::new()),
                )
            }
        };

    let llm = Arc::new(OpenRouterClient::new(
        config.api_key.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    ));

    let agent = Arc::new(Agent::new(
        config.clone(),
        llm,
        threads.clone(),
        itineraries,
    ));

    let state = AppState { agent, threads };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
