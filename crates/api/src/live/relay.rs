use std::sync::Arc;

use axum::extract::ws::Message;
use calibra_events::LiveEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Forwards every [`LiveEvent`] to all connected browsers.
///
/// Events are broadcast to every client; there is no per-user routing.
pub struct LiveUpdateRelay {
    ws_manager: Arc<WsManager>,
}

impl LiveUpdateRelay {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the event bus is dropped.
    ///
    /// A lagging receiver logs the number of skipped events and keeps going;
    /// clients catch up on the next event or by refetching.
    pub async fn run(self, mut receiver: broadcast::Receiver<LiveEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let delivered = self.ws_manager.broadcast(event_frame(&event)).await;
                    tracing::debug!(
                        event_type = %event.event_type,
                        gauge_id = event.gauge_id.as_deref().unwrap_or("-"),
                        delivered,
                        "Relayed live update"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Live-update relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, live-update relay shutting down");
                    break;
                }
            }
        }
    }
}

/// Encode an event as the text frame browsers receive.
pub fn event_frame(event: &LiveEvent) -> Message {
    Message::Text(event.client_frame().to_string().into())
}
