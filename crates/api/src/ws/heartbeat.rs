use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Ping every dashboard socket on `interval` until `cancel` fires.
///
/// Each tick also evicts connections whose writer task has already died.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nobody is connected yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let pruned = ws_manager.ping_and_prune().await;
                    let live = ws_manager.connection_count().await;
                    if pruned > 0 {
                        tracing::info!(pruned, live, "Heartbeat evicted dead WebSocket connections");
                    } else {
                        tracing::trace!(live, "Heartbeat ping sent");
                    }
                }
            }
        }
    })
}
