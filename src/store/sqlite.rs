//! SQLite-backed stores.
//!
//! One connection handle is opened at startup by the composition root and
//! shared by both stores; rusqlite is synchronous, so the handle sits
//! behind an async mutex and queries run while holding it. Write volume is
//! one row per chat message, which keeps contention negligible.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::llm::ChatMessage;

use super::{
    now_string, summary_title, ConversationThread, Itinerary, ItineraryStore, StoreError,
    ThreadStore, ThreadSummary,
};

/// Shared connection handle.
pub type Database = Arc<Mutex<Connection>>;

/// Open (or create) the database file and run schema migration.
pub fn open_database(path: &Path) -> Result<Database, StoreError> {
    let conn = Connection::open(path).map_err(db_err)?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS threads (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS messages (
            thread_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            payload TEXT NOT NULL,
            PRIMARY KEY (thread_id, position)
        );
        CREATE TABLE IF NOT EXISTS itineraries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            destination TEXT NOT NULL,
            duration TEXT NOT NULL,
            days TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )
    .map_err(db_err)?;

    Ok(Arc::new(Mutex::new(conn)))
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Database(format!("message payload: {}", e))
}

#[derive(Clone)]
pub struct SqliteThreadStore {
    db: Database,
}

impl SqliteThreadStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn load_messages(conn: &Connection, thread_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let mut stmt = conn
            .prepare("SELECT payload FROM messages WHERE thread_id = ?1 ORDER BY position")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![thread_id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(db_err)?;

        let mut messages = Vec::new();
        for payload in rows {
            let payload = payload.map_err(db_err)?;
            messages.push(serde_json::from_str(&payload).map_err(json_err)?);
        }
        Ok(messages)
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn create(&self, user_id: &str) -> Result<ConversationThread, StoreError> {
        let thread = ConversationThread {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            messages: Vec::new(),
            created_at: now_string(),
        };

        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO threads (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![thread.id.to_string(), thread.user_id, thread.created_at],
        )
        .map_err(db_err)?;

        Ok(thread)
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        message: ChatMessage,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&message).map_err(json_err)?;

        let conn = self.db.lock().await;
        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM threads WHERE id = ?1",
                params![thread_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(StoreError::ThreadNotFound(thread_id));
        }

        conn.execute(
            "INSERT INTO messages (thread_id, position, payload)
             SELECT ?1, COALESCE(MAX(position) + 1, 0), ?2 FROM messages WHERE thread_id = ?1",
            params![thread_id.to_string(), payload],
        )
        .map_err(db_err)?;

        Ok(())
    }

    async fn get(&self, thread_id: Uuid, user_id: &str) -> Result<ConversationThread, StoreError> {
        let conn = self.db.lock().await;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT user_id, created_at FROM threads WHERE id = ?1",
                params![thread_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        let (owner, created_at) = match row {
            Some(row) => row,
            None => return Err(StoreError::ThreadNotFound(thread_id)),
        };
        if owner != user_id {
            return Err(StoreError::ThreadNotFound(thread_id));
        }

        let messages = Self::load_messages(&conn, thread_id)?;

        Ok(ConversationThread {
            id: thread_id,
            user_id: owner,
            messages,
            created_at,
        })
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ThreadSummary>, StoreError> {
        let conn = self.db.lock().await;

        let mut stmt = conn
            .prepare(
                "SELECT id, created_at FROM threads WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, created_at) = row.map_err(db_err)?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| StoreError::Database(format!("thread id: {}", e)))?;
            let messages = Self::load_messages(&conn, id)?;
            summaries.push(ThreadSummary {
                id,
                title: summary_title(&messages),
                message_count: messages.len(),
                created_at,
            });
        }
        Ok(summaries)
    }

    async fn delete(&self, thread_id: Uuid, user_id: &str) -> Result<bool, StoreError> {
        let conn = self.db.lock().await;

        let removed = conn
            .execute(
                "DELETE FROM threads WHERE id = ?1 AND user_id = ?2",
                params![thread_id.to_string(), user_id],
            )
            .map_err(db_err)?;
        if removed == 0 {
            return Ok(false);
        }

        conn.execute(
            "DELETE FROM messages WHERE thread_id = ?1",
            params![thread_id.to_string()],
        )
        .map_err(db_err)?;

        Ok(true)
    }
}

#[derive(Clone)]
pub struct SqliteItineraryStore {
    db: Database,
}

impl SqliteItineraryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ItineraryStore for SqliteItineraryStore {
    async fn insert(&self, itinerary: &Itinerary) -> Result<(), StoreError> {
        let days = serde_json::to_string(&itinerary.days).map_err(json_err)?;

        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO itineraries (user_id, destination, duration, days, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                itinerary.user_id,
                itinerary.destination,
                itinerary.duration,
                days,
                now_string()
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }
}
