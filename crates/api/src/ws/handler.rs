use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use quill_core::collaboration::CollabMessage;
use quill_core::error::CoreError;

use crate::auth::jwt;
use crate::collab::CollabSession;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Query parameters for the WebSocket upgrade request.
///
/// Browsers cannot set an `Authorization` header on a WebSocket handshake,
/// so the access token travels as a query parameter instead.
#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// HTTP handler that authenticates and upgrades to WebSocket.
///
/// Rejects with 401 before upgrading if the token is missing or invalid.
/// After the upgrade the connection is registered with `WsManager` and a
/// [`CollabSession`] processes its messages.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let claims = jwt::validate_token(&query.token, &state.config.jwt).map_err(|e| {
        tracing::debug!(error = %e, "WebSocket token rejected");
        AppError::Core(CoreError::Unauthorized(
            "Invalid or expired access token".into(),
        ))
    })?;
    let user = AuthUser::from(claims);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Feeds inbound protocol messages to the connection's `CollabSession`.
///   4. Tears the session down on disconnect (releases leases, clears
///      presence).
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        conn_id = %conn_id,
        user_id = user.user_id,
        organization_id = user.organization_id,
        "WebSocket connected"
    );

    // Register and get the receiver for outbound messages.
    let mut rx = state
        .ws_manager
        .add(conn_id.clone(), user.user_id, user.organization_id)
        .await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    let mut session = CollabSession::new(state.clone(), conn_id.clone(), user);

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<CollabMessage>(&text) {
                Ok(msg) => session.handle_message(msg).await,
                Err(e) => {
                    tracing::warn!(
                        conn_id = %conn_id,
                        error = %e,
                        "Unparseable WebSocket message"
                    );
                }
            },
            Ok(_) => {
                // Binary and Ping frames carry nothing in this protocol.
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: release leases and presence, then drop the connection.
    session.shutdown().await;
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
