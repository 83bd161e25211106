//! Chat and thread handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::agent::{AgentError, FALLBACK_REPLY};

use super::routes::AppState;
use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, MessageView, ThreadListResponse, ThreadQuery,
    ThreadResponse,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// POST /api/chat - run one agent turn.
///
/// Unrecoverable turn failures come back as a normal reply carrying the
/// generic apology, per the "never leave the user hanging" policy.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    match state
        .agent
        .run_turn(&request.user_id, request.thread_id, &request.message)
        .await
    {
        Ok(outcome) => Ok(Json(ChatResponse {
            thread_id: Some(outcome.thread_id),
            reply: outcome.reply,
            intent: Some(outcome.intent),
        })),
        Err(AgentError::ThreadNotFound(id)) => {
            Err(not_found(format!("Thread {} not found", id)))
        }
        Err(err) => {
            tracing::error!(error = %err, "turn failed");
            Ok(Json(ChatResponse {
                thread_id: request.thread_id,
                reply: FALLBACK_REPLY.to_string(),
                intent: None,
            }))
        }
    }
}

/// GET /api/threads - list the caller's threads.
pub async fn list_threads(
    State(state): State<AppState>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<ThreadListResponse>, ApiError> {
    let threads = state
        .threads
        .list(&query.user_id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(ThreadListResponse { threads }))
}

/// GET /api/threads/:id - fetch one thread's visible messages.
pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let thread = state
        .threads
        .get(id, &query.user_id)
        .await
        .map_err(|e| not_found(e.to_string()))?;

    let messages = thread
        .messages
        .iter()
        .filter_map(MessageView::from_message)
        .collect();

    Ok(Json(ThreadResponse {
        id: thread.id,
        created_at: thread.created_at,
        messages,
    }))
}

/// DELETE /api/threads/:id - hard-delete a thread.
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .agent
        .delete_thread(&query.user_id, id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("Thread {} not found", id)))
    }
}
