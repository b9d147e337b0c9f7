//! REST endpoints + WebSocket event feed for the task registry.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::model::{CreateTaskRequest, CreateTaskResponse, Task, TaskEvent};
use super::registry::TaskRegistry;
use crate::config::{ReportMode, ServerConfig};
use crate::error::TaskError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
    /// Landing page served at `/`.
    pub index_path: PathBuf,
    pub report_mode: ReportMode,
}

/// Build the Axum router with the task REST routes and event socket.
pub fn task_routes(registry: Arc<TaskRegistry>, config: &ServerConfig) -> Router {
    let state = AppState {
        registry,
        index_path: config.index_path.clone(),
        report_mode: config.report_mode,
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/addTask", post(add_task))
        .route("/getTaskStatus", get(get_task_status))
        .route("/getOperations", get(get_operations))
        .route(
            "/getTaskForExecution",
            get(get_task_for_execution).post(get_task_for_execution),
        )
        .route("/handleResult", post(handle_result))
        .with_state(state)
}

/// Decode a JSON body regardless of its declared content type.
fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, TaskError> {
    serde_json::from_slice(body).map_err(|e| TaskError::MalformedInput(e.to_string()))
}

// ── Landing page / health ───────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read(&state.index_path).await {
        Ok(html) => ([(header::CONTENT_TYPE, "text/html")], html).into_response(),
        Err(e) => {
            error!(path = %state.index_path.display(), error = %e, "Failed to read landing page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let counts = state.registry.counts().await;
    Json(serde_json::json!({
        "status": "ok",
        "service": "task-dispatch",
        "tasks": counts,
    }))
}

// ── REST Endpoints ──────────────────────────────────────────────────────

async fn add_task(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CreateTaskRequest = match decode_body(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected addTask payload");
            return e.into_response();
        }
    };

    let id = state.registry.create(request.expression).await;
    Json(CreateTaskResponse { id }).into_response()
}

/// Only the canonical decimal spelling of an id names a task; `01` or `+1`
/// match nothing.
fn parse_task_id(raw: &str) -> Option<u64> {
    let id = raw.parse::<u64>().ok()?;
    (id.to_string() == raw).then_some(id)
}

#[derive(Deserialize)]
struct StatusQuery {
    id: Option<String>,
}

async fn get_task_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let Some(id) = query.id.as_deref().and_then(parse_task_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Task not found"})),
        )
            .into_response();
    };

    match state.registry.get_status(id).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_operations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list_operations().to_vec())
}

async fn get_task_for_execution(State(state): State<AppState>) -> Response {
    match state.registry.claim_next().await {
        Some(task) => Json(task).into_response(),
        None => {
            debug!("Claim requested with no pending tasks");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "No pending tasks"})),
            )
                .into_response()
        }
    }
}

async fn handle_result(State(state): State<AppState>, body: Bytes) -> Response {
    let task: Task = match decode_body(&body) {
        Ok(task) => task,
        Err(e) => {
            debug!(error = %e, "Rejected handleResult payload");
            return e.into_response();
        }
    };

    match state.report_mode {
        ReportMode::Overwrite => {
            state.registry.report_result(task).await;
            StatusCode::NO_CONTENT.into_response()
        }
        ReportMode::Strict => {
            let Some(result) = task.result else {
                return TaskError::MalformedInput(format!("report for task {} has no result", task.id))
                    .into_response();
            };
            match state.registry.complete(task.id, result).await {
                Ok(_) => StatusCode::NO_CONTENT.into_response(),
                Err(e) => {
                    warn!(task_id = task.id, error = %e, "Report rejected");
                    e.into_response()
                }
            }
        }
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.registry))
}

async fn send_event(socket: &mut WebSocket, event: &TaskEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!(error = %e, "Failed to serialize task event");
            true
        }
    }
}

async fn send_pending_sync(socket: &mut WebSocket, registry: &TaskRegistry) -> bool {
    let tasks = registry.pending_tasks().await;
    send_event(socket, &TaskEvent::PendingSync { tasks }).await
}

async fn handle_socket(mut socket: WebSocket, registry: Arc<TaskRegistry>) {
    info!("WebSocket client connected");

    // Subscribe before the snapshot so no event falls between the two.
    let mut rx = registry.subscribe();

    if !send_pending_sync(&mut socket, &registry).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind task events");
                        if !send_pending_sync(&mut socket, &registry).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_must_be_canonical_decimal() {
        assert_eq!(parse_task_id("1"), Some(1));
        assert_eq!(parse_task_id("9999"), Some(9999));
        assert_eq!(parse_task_id("01"), None);
        assert_eq!(parse_task_id("+1"), None);
        assert_eq!(parse_task_id(" 1"), None);
        assert_eq!(parse_task_id("-1"), None);
        assert_eq!(parse_task_id("abc"), None);
        assert_eq!(parse_task_id(""), None);
    }
}
