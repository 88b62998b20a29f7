use crate::domain::layout::{MAX_OPTIONS, MIN_OPTIONS};
use crate::domain::{SessionRecord, SessionStatus};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::net::client::spawn_session_serializer;
use crate::interface_adapters::state::AppState;
use crate::use_cases::session::SessionError;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, serde::Deserialize)]
pub struct SessionInitRequest {
    pub title: String,
    pub question: String,
    // Option labels in the order clients will address them by index.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
struct SessionInitResponse {
    // The session id that was created.
    session_id: String,
}

#[derive(Debug, serde::Serialize)]
struct SessionSummary {
    session_id: String,
    title: String,
    question: String,
    options: Vec<String>,
    status: SessionStatus,
    participants: u32,
}

pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionInitRequest>,
) -> impl IntoResponse {
    let title = payload.title.trim().to_string();
    let question = payload.question.trim().to_string();
    if title.is_empty() || question.is_empty() {
        return bad_request("title and question are required");
    }

    // Blank option slots are dropped before validating the count, so a form
    // submitting trailing empties still works.
    let options: Vec<String> = payload
        .options
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return bad_request("between 2 and 6 options are required");
    }

    let record = SessionRecord {
        session_id: Uuid::new_v4().to_string(),
        title,
        question,
        options,
        status: SessionStatus::Pending,
    };

    // Persist first: a session the store never saw cannot be listed or
    // resumed, so store failure aborts creation.
    if let Err(error) = state.store.create_session(record.clone()).await {
        warn!(%error, "failed to persist new session");
        return (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: "session store unavailable".to_string(),
            }),
        )
            .into_response();
    }

    let session_id = record.session_id.clone();
    match state
        .session_registry
        .open_session(record, state.store.clone())
        .await
    {
        Ok(session) => {
            // Start the serializer so clients can subscribe immediately.
            spawn_session_serializer(&session);
            (StatusCode::CREATED, Json(SessionInitResponse { session_id })).into_response()
        }
        Err(SessionError::AlreadyExists) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "session already exists".to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn list_sessions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = match state.store.list_open_sessions().await {
        Ok(records) => records,
        Err(error) => {
            warn!(%error, "failed to list sessions");
            return (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "session store unavailable".to_string(),
                }),
            )
                .into_response();
        }
    };

    // Count lookups run concurrently and are best-effort; a session with a
    // failing count still lists with zero participants.
    let sessions = join_all(records.into_iter().map(|record| {
        let store = state.store.clone();
        async move {
            let participants = store
                .participant_count(&record.session_id)
                .await
                .unwrap_or(0);
            SessionSummary {
                session_id: record.session_id,
                title: record.title,
                question: record.question,
                options: record.options,
                status: record.status,
                participants,
            }
        }
    }))
    .await;

    Json(sessions).into_response()
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
