//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection pushes the session's visible snapshot on connect and again
//! after every change event, whether it came from the database change feed or
//! from a write made through this service.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use bitacora_core::sync::{fetch_visible, total_outage};
use bitacora_core::SessionContext;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, ctx))
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            return false;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

/// Re-fetches everything `ctx` may see and pushes it. A total outage is
/// also reported as an error message so the client can offer a retry.
async fn push_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    app_state: &AppState,
    ctx: &SessionContext,
) -> bool {
    let outcome = fetch_visible(app_state.db.as_ref(), ctx).await;
    let outage = total_outage(&outcome);
    if !send(sender, &ServerMessage::snapshot(outcome, ctx)).await {
        return false;
    }
    match outage {
        Some(e) => {
            let msg = ServerMessage::Error {
                message: format!("No se pudieron cargar los datos: {}", e),
            };
            send(sender, &msg).await
        }
        None => true,
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, ctx: SessionContext) {
    info!("New WebSocket connection established for user: {}", ctx.user_id);

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the first fetch so no change slips in between.
    let mut changes = app_state.changes.subscribe();

    if !push_snapshot(&mut sender, &app_state, &ctx).await {
        warn!("Client {} went away before the first snapshot.", ctx.user_id);
        return;
    }

    loop {
        let alive = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Refresh) => {
                            push_snapshot(&mut sender, &app_state, &ctx).await
                        }
                        Err(e) => {
                            warn!("Ignoring unrecognized client message: {}", e);
                            true
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => false,
                Some(Ok(_)) => true,
                Some(Err(e)) => {
                    warn!("WebSocket receive error for {}: {:?}", ctx.user_id, e);
                    false
                }
            },
            change = changes.recv() => match change {
                Ok(event) => {
                    info!("Refreshing {} after {:?} on {}", ctx.user_id, event.operation, event.collection);
                    push_snapshot(&mut sender, &app_state, &ctx).await
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session {} lagged by {} change events; refreshing.", ctx.user_id, skipped);
                    push_snapshot(&mut sender, &app_state, &ctx).await
                }
                Err(RecvError::Closed) => false,
            },
        };
        if !alive {
            break;
        }
    }

    info!("WebSocket connection closed for user: {}", ctx.user_id);
}
