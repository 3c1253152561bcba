//! Connection Lifecycle
//!
//! The attach/detach protocol for one signaling connection:
//! register on connect, forward every inbound frame to the router while
//! active, and run teardown exactly once on the transport's terminal signal,
//! whichever path fired it (graceful close, error, or cancellation).

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::registry::ConnectionRegistry;
use super::router::SignalingRouter;
use crate::api::AppState;

/// Optional query parameters for the upgrade request
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// User identity to attach to the connection post-handshake
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler, the entry point for signaling connections
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = Arc::clone(&state.registry);
    let router = Arc::clone(&state.router);
    ws.on_upgrade(move |socket| handle_socket(socket, registry, router, params.user_id))
}

/// Drive one connection from register to teardown
///
/// CONNECTING -> ACTIVE on successful registration; ACTIVE -> CLOSED when
/// either the read or write side terminates. Both terminal paths converge on
/// the single unregister call after the select, and unregister itself is
/// idempotent, so teardown cannot run its effects twice even if paths race.
async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    router: Arc<SignalingRouter>,
    user_id: Option<String>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = Uuid::new_v4().to_string();
    if let Err(e) = registry.register(connection_id.clone(), tx).await {
        // Ids are freshly minted UUIDs, so a collision means a broken transport contract
        tracing::error!(error = %e, "failed to register signaling connection");
        let _ = sink.close().await;
        return;
    }

    if let Some(user) = user_id {
        registry.attach_user(&connection_id, user).await;
    }

    // Write task: drain the outbound channel into the socket. Envelopes
    // arrive already serialized, in the order deliver pushed them.
    let conn_id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "websocket send failed, closing connection"
                );
                break;
            }
        }
    });

    // Read loop: frames processed sequentially, preserving per-sender order.
    // Frame-level failures (malformed, unknown type) are handled inside
    // dispatch and never end the loop; only transport signals do.
    let router_for_recv = Arc::clone(&router);
    let conn_id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    router_for_recv.dispatch(&conn_id_for_recv, &text).await;
                }
                Ok(Message::Binary(_)) => {
                    router_for_recv
                        .reject_frame(&conn_id_for_recv, "binary frame on text protocol")
                        .await;
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %conn_id_for_recv, "client requested close");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "websocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // Single teardown point for every terminal path
    registry.unregister(&connection_id).await;
}
