use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::jwt::access_subject;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// What changed. Subscribers refetch statuses on any of these.
#[derive(Debug, Clone, Copy)]
pub enum Change {
    LogType(Uuid),
    Log { id: Uuid, type_id: Uuid },
    Tracker(Uuid),
}

/// Broadcast a change to the owner's open sockets.
pub fn notify(state: &AppState, user_id: &str, change: Change) {
    let Some(tx) = state.ws_tx.as_ref() else {
        return;
    };
    let msg = match change {
        Change::LogType(id) => serde_json::json!({
            "type": "log_type_changed",
            "user_id": user_id,
            "log_type_id": id,
        }),
        Change::Log { id, type_id } => serde_json::json!({
            "type": "log_changed",
            "user_id": user_id,
            "log_id": id,
            "log_type_id": type_id,
        }),
        Change::Tracker(id) => serde_json::json!({
            "type": "tracker_changed",
            "user_id": user_id,
            "tracker_id": id,
        }),
    };
    // No subscribers is not an error.
    let _ = tx.send(msg.to_string());
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let token = match query.token.as_deref() {
        Some(token) => token,
        None => {
            tracing::warn!("WebSocket auth failed: missing token query parameter");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };
    let user_id = match access_subject(token, &state.config) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("WebSocket auth failed: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

fn is_for(msg: &str, user_id: &str) -> bool {
    serde_json::from_str::<Value>(msg)
        .ok()
        .and_then(|parsed| {
            parsed
                .get("user_id")
                .and_then(|v| v.as_str())
                .map(|owner| owner == user_id)
        })
        .unwrap_or(false)
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let Some(mut rx) = state.ws_tx.as_ref().map(|tx| tx.subscribe()) else {
        tracing::warn!("change feed disabled, closing socket");
        return;
    };
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!(user_id = %user_id, "WebSocket connection established");

    let uid = user_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !is_for(&msg, &uid) {
                        continue;
                    }
                    if sender.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %uid, skipped, "WebSocket subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let rid = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    tracing::debug!(user_id = %rid, message = %text, "WebSocket message received");
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!(user_id = %user_id, "WebSocket connection closed");
}
