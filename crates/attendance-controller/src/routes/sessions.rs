//! Session lifecycle handlers.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use super::AppState;
use crate::actors::{ActivationResult, CompletionResult, RotationResult};
use crate::errors::AttendanceError;
use crate::types::{Session, SessionSeed};

/// `POST /api/v1/sessions` - register a scheduled session.
///
/// The scheduling subsystem owns session identity and the meeting window;
/// this endpoint is the boundary where its output enters the controller.
pub async fn register(
    State(state): State<AppState>,
    Json(seed): Json<SessionSeed>,
) -> Result<(StatusCode, Json<Session>), AttendanceError> {
    if seed.id.is_empty() {
        return Err(AttendanceError::InvalidFormat(
            "missing session identifier".to_string(),
        ));
    }
    let session = state.registry.register_session(seed).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /api/v1/sessions/{id}` - current session snapshot.
pub async fn snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AttendanceError> {
    let handle = state.registry.get_session(id).await?;
    Ok(Json(handle.snapshot().await?))
}

/// `POST /api/v1/sessions/{id}/activate` - start accepting scans.
pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivationResult>, AttendanceError> {
    let handle = state.registry.get_session(id).await?;
    Ok(Json(handle.activate().await?))
}

/// `POST /api/v1/sessions/{id}/rotate` - issue a fresh token.
pub async fn rotate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RotationResult>, AttendanceError> {
    let handle = state.registry.get_session(id).await?;
    Ok(Json(handle.rotate().await?))
}

/// `POST /api/v1/sessions/{id}/complete` - close out the session.
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompletionResult>, AttendanceError> {
    let handle = state.registry.get_session(id).await?;
    Ok(Json(handle.complete().await?))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// `POST /api/v1/sessions/{id}/cancel` - cancel with a reason.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Session>, AttendanceError> {
    let handle = state.registry.get_session(id).await?;
    Ok(Json(handle.cancel_session(request.reason).await?))
}

/// `GET /api/v1/sessions/{id}/events` - SSE stream of session events.
///
/// Best-effort delivery: a subscriber that lags more than the topic buffer
/// loses the oldest events and the stream continues. The stream ends when
/// the session reaches a terminal state and its topic is removed.
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AttendanceError> {
    // 404 before subscribing so unknown ids don't create orphan topics.
    state.registry.get_session(id.clone()).await?;

    let receiver = state.topics.subscribe(&id);
    let stream = BroadcastStream::new(receiver).filter_map(move |message| match message {
        Ok(event) => match Event::default().json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(e) => {
                warn!(
                    target: "attendance.http",
                    error = %e,
                    "failed to encode session event"
                );
                None
            }
        },
        // Lagged subscribers skip dropped events and keep going.
        Err(_) => None,
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
