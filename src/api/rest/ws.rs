use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::engine::session::TrackingSession;
use crate::error::AppError;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session(&id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session)))
}

async fn handle_socket(socket: WebSocket, session: Arc<TrackingSession>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = session.subscribe();
    let order_id = session.id().to_string();

    info!(order_id = %order_id, "websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let snapshot = match rx.recv().await {
                Ok(snapshot) => snapshot,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket client lagging; skipping snapshots");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&snapshot) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize snapshot for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(order_id = %order_id, "websocket client disconnected");
}
