//! Routes: push-channel ingress over WebSocket, projection reads, and the
//! playback-finished / voice catalog signals a display layer sends back.

use anchordesk_core::{IngestOutcome, PresenterHandle, Projection, StaticVoiceCatalog, Voice};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub presenter: PresenterHandle,
    pub voices: Arc<StaticVoiceCatalog>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/ingest", get(ws_ingest))
        .route("/ws/state", get(ws_state))
        .route("/api/ingest", post(ingest))
        .route("/api/state", get(current_state))
        .route("/api/media/ended", post(media_ended))
        .route("/api/voices", post(replace_voices))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    outcome: IngestOutcome,
}

/// Same envelopes as the WebSocket, one per request.
async fn ingest(State(state): State<AppState>, body: String) -> Response {
    match state.presenter.ingest(&body) {
        Ok(outcome) => {
            let status = match outcome {
                IngestOutcome::Rejected => StatusCode::BAD_REQUEST,
                _ => StatusCode::ACCEPTED,
            };
            (status, Json(IngestResponse { outcome })).into_response()
        }
        Err(e) => unavailable(e),
    }
}

async fn current_state(State(state): State<AppState>) -> Response {
    match state.presenter.query().await {
        Ok(projection) => Json(projection).into_response(),
        Err(e) => unavailable(e),
    }
}

#[derive(Debug, Default, Deserialize)]
struct MediaEndedBody {
    #[serde(default)]
    url: Option<String>,
}

async fn media_ended(State(state): State<AppState>, body: Option<Json<MediaEndedBody>>) -> Response {
    let url = body.and_then(|Json(b)| b.url);
    match state.presenter.media_ended(url) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => unavailable(e),
    }
}

#[derive(Debug, Serialize)]
struct VoicesResponse {
    count: usize,
}

async fn replace_voices(
    State(state): State<AppState>,
    Json(voices): Json<Vec<Voice>>,
) -> Json<VoicesResponse> {
    let count = voices.len();
    info!(count, "voice catalog replaced");
    state.voices.replace(voices);
    Json(VoicesResponse { count })
}

fn unavailable(e: anchordesk_core::DeskError) -> Response {
    warn!(error = %e, "presenter unavailable");
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
}

async fn ws_ingest(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_ingest_socket(socket, state.presenter))
}

async fn handle_ingest_socket(mut socket: WebSocket, presenter: PresenterHandle) {
    info!("ingress socket connected");
    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "ingress socket error");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                if text.trim() == "ping" {
                    if socket.send(Message::Text("pong".to_string())).await.is_err() {
                        break;
                    }
                    continue;
                }
                if let Err(e) = presenter.ingest(&text) {
                    warn!(error = %e, "presenter gone, closing ingress socket");
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!("ingress socket disconnected");
}

async fn ws_state(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_state_socket(socket, state.presenter))
}

/// Push the projection on connect and on every change.
async fn handle_state_socket(mut socket: WebSocket, presenter: PresenterHandle) {
    let mut updates = presenter.subscribe();
    loop {
        let frame = {
            let projection: Projection = updates.borrow_and_update().clone();
            serde_json::to_string(&projection)
        };
        let Ok(frame) = frame else {
            break;
        };
        if socket.send(Message::Text(frame)).await.is_err() {
            break;
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("state socket closed");
}
