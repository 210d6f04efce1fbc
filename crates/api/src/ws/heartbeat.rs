use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that keeps WebSocket connections healthy.
///
/// Every tick it sends a Ping frame to all connected clients and prunes
/// connections whose channels have gone dead, so the subscription map does
/// not accumulate entries for sockets that disconnected uncleanly.
///
/// The task runs until the server aborts the returned `JoinHandle` during
/// shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let pruned = ws_manager.ping_all().await;
            let count = ws_manager.connection_count().await;
            if pruned > 0 {
                tracing::info!(pruned, count, "WebSocket heartbeat pruned dead connections");
            } else {
                tracing::debug!(count, "WebSocket heartbeat ping");
            }
        }
    })
}
