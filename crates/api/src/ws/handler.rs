use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// GET /api/v1/ws
///
/// Dashboards subscribe here for gauge, alert and threshold frames. The
/// socket is receive-only from the client's point of view.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_dashboard(socket, state.ws_manager))
}

async fn serve_dashboard(socket: WebSocket, ws_manager: Arc<WsManager>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let outbound = ws_manager.add(conn_id.clone()).await;
    let (sink, stream) = socket.split();
    tracing::info!(conn_id = %conn_id, "Dashboard connected");

    // Whichever side finishes first ends the connection.
    tokio::select! {
        reason = forward_outbound(outbound, sink) => {
            tracing::debug!(conn_id = %conn_id, reason, "Writer finished");
        }
        reason = drain_inbound(stream) => {
            tracing::debug!(conn_id = %conn_id, reason, "Reader finished");
        }
    }

    ws_manager.remove(&conn_id).await;
    tracing::info!(conn_id = %conn_id, "Dashboard disconnected");
}

/// Write frames queued by the manager until a Close is sent or the peer
/// stops accepting.
async fn forward_outbound(
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut sink: SplitSink<WebSocket, Message>,
) -> &'static str {
    while let Some(msg) = outbound.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if sink.send(msg).await.is_err() {
            return "sink error";
        }
        if closing {
            return "server close";
        }
    }
    "manager dropped connection"
}

/// Read until the client closes. Client payloads are ignored.
async fn drain_inbound(mut stream: SplitStream<WebSocket>) -> &'static str {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => return "client close",
            Ok(_) => {}
            Err(_) => return "receive error",
        }
    }
    "stream ended"
}
