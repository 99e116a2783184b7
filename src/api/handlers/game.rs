//! Free-play sessions: create, start, call, mark, reset

use super::AppState;
use crate::api::{
    errors::{ApiError, ResultExt},
    extract::{ApiJson, ApiPath},
    middleware::RequestId,
    models::*,
};
use crate::game::SessionSnapshot;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// POST /games
pub async fn create_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let snapshot = state.sessions.create().or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /games/:session_id
pub async fn get_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .sessions
        .with_session(&session_id, |s| Ok(s.snapshot()))
        .await
        .or_api(&request_id)?;
    Ok(Json(snapshot))
}

/// POST /games/:session_id/start
pub async fn start_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .sessions
        .with_session(&session_id, |s| {
            s.start();
            Ok(s.snapshot())
        })
        .await
        .or_api(&request_id)?;
    Ok(Json(snapshot))
}

/// POST /games/:session_id/call
pub async fn call_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<CallResponse>, ApiError> {
    let (called, session) = state
        .sessions
        .with_session(&session_id, |s| {
            let called = s.call_next()?;
            Ok((called, s.snapshot()))
        })
        .await
        .or_api(&request_id)?;
    state.sessions.number_called();

    Ok(Json(CallResponse {
        token: called.token(),
        number: called.number,
        announce_for_ms: state.config.game.announcement_ms,
        session,
    }))
}

/// POST /games/:session_id/marks
pub async fn toggle_mark_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
    ApiJson(body): ApiJson<MarkBody>,
) -> Result<Json<MarkResponse>, ApiError> {
    let (marked, session) = state
        .sessions
        .with_session(&session_id, |s| {
            let marked = s.toggle_mark(body.number)?;
            Ok((marked, s.snapshot()))
        })
        .await
        .or_api(&request_id)?;

    Ok(Json(MarkResponse {
        number: body.number,
        marked,
        session,
    }))
}

/// POST /games/:session_id/reset
pub async fn reset_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .sessions
        .with_session(&session_id, |s| {
            s.reset();
            Ok(s.snapshot())
        })
        .await
        .or_api(&request_id)?;
    Ok(Json(snapshot))
}

/// POST /games/:session_id/card
pub async fn new_card_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .sessions
        .with_session(&session_id, |s| {
            s.generate_new_card();
            Ok(s.snapshot())
        })
        .await
        .or_api(&request_id)?;
    Ok(Json(snapshot))
}

/// DELETE /games/:session_id
pub async fn end_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(
            request_id.0,
            "game session not found".to_string(),
        ))
    }
}

/// GET /games/:session_id/events (WebSocket)
pub async fn events_handler(
    ws: WebSocketUpgrade,
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Response, ApiError> {
    let session = state.sessions.get(&session_id).ok_or_else(|| {
        ApiError::not_found(request_id.0.clone(), "game session not found".to_string())
    })?;
    let events = session.lock().await.subscribe();

    Ok(ws.on_upgrade(move |socket| stream_events(socket, session_id, events)))
}

async fn stream_events(
    socket: WebSocket,
    session_id: String,
    mut events: tokio::sync::broadcast::Receiver<crate::game::GameEvent>,
) {
    info!(session_id = %session_id, "🔌 Event stream connected");
    let (mut sender, mut receiver) = socket.split();

    let send_task = async {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(session_id = %session_id, skipped, "Event stream lagged");
                    continue;
                }
                // session dropped
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize game event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    };

    let receive_task = async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = send_task => debug!(session_id = %session_id, "Event sender finished"),
        _ = receive_task => debug!(session_id = %session_id, "Client closed event stream"),
    }
    info!(session_id = %session_id, "🔌 Event stream disconnected");
}
