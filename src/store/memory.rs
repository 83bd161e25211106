//! In-memory stores (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::llm::ChatMessage;

use super::{
    now_string, summary_title, ConversationThread, Itinerary, ItineraryStore, StoreError,
    ThreadStore, ThreadSummary,
};

#[derive(Clone, Default)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<Uuid, ConversationThread>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn create(&self, user_id: &str) -> Result<ConversationThread, StoreError> {
        let thread = ConversationThread {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            messages: Vec::new(),
            created_at: now_string(),
        };
        self.threads
            .write()
            .await
            .insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        message: ChatMessage,
    ) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(&thread_id)
            .ok_or(StoreError::ThreadNotFound(thread_id))?;
        thread.messages.push(message);
        Ok(())
    }

    async fn get(&self, thread_id: Uuid, user_id: &str) -> Result<ConversationThread, StoreError> {
        let threads = self.threads.read().await;
        threads
            .get(&thread_id)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .ok_or(StoreError::ThreadNotFound(thread_id))
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ThreadSummary>, StoreError> {
        let threads = self.threads.read().await;
        let mut summaries: Vec<ThreadSummary> = threads
            .values()
            .filter(|t| t.user_id == user_id)
            .map(|t| ThreadSummary {
                id: t.id,
                title: summary_title(&t.messages),
                message_count: t.messages.len(),
                created_at: t.created_at.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn delete(&self, thread_id: Uuid, user_id: &str) -> Result<bool, StoreError> {
        let mut threads = self.threads.write().await;
        let owned = threads
            .get(&thread_id)
            .map(|t| t.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        Ok(threads.remove(&thread_id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryItineraryStore {
    itineraries: Arc<RwLock<Vec<Itinerary>>>,
}

impl InMemoryItineraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything inserted so far (test inspection).
    pub async fn all(&self) -> Vec<Itinerary> {
        self.itineraries.read().await.clone()
    }
}

#[async_trait]
impl ItineraryStore for InMemoryItineraryStore {
    async fn insert(&self, itinerary: &Itinerary) -> Result<(), StoreError> {
        self.itineraries.write().await.push(itinerary.clone());
        Ok(())
    }
}
