//! Event-to-WebSocket fanout.
//!
//! [`EventFanout`] subscribes to the document event bus and translates each
//! [`DocumentEvent`] into the protocol message subscribed clients receive.
//! This is the single place bus events become wire messages; HTTP handlers
//! and edit sessions only ever publish to the bus.

use std::sync::Arc;

use tokio::sync::broadcast;

use quill_core::collaboration::{CollabMessage, PresenceUser};
use quill_db::repositories::PresenceRepo;
use quill_db::DbPool;
use quill_events::{DocumentEvent, DocumentEventKind};

use crate::ws::WsManager;

/// Routes document events to subscribed WebSocket connections.
pub struct EventFanout {
    pool: DbPool,
    ws_manager: Arc<WsManager>,
}

impl EventFanout {
    /// Create a new fanout with the given database pool and WebSocket manager.
    pub fn new(pool: DbPool, ws_manager: Arc<WsManager>) -> Self {
        Self { pool, ws_manager }
    }

    /// Run the main fanout loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each event.
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](quill_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<DocumentEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.route_event(&event).await {
                        tracing::error!(
                            error = %e,
                            document_id = event.document_id,
                            "Failed to fan out event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event fanout lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, fanout shutting down");
                    break;
                }
            }
        }
    }

    /// Translate one event into a wire message and deliver it to every
    /// connection subscribed to the document, within the event's
    /// organization.
    async fn route_event(&self, event: &DocumentEvent) -> Result<(), sqlx::Error> {
        let message = match &event.kind {
            DocumentEventKind::ContentUpdated {
                content,
                updated_at,
            } => CollabMessage::DocumentUpdated {
                document_id: event.document_id,
                content: content.clone(),
                updated_at: *updated_at,
                actor_user_id: event.actor_user_id,
            },
            DocumentEventKind::LockAcquired {
                user_name,
                expires_at,
            } => CollabMessage::LockAcquired {
                document_id: event.document_id,
                user_id: event.actor_user_id,
                user_name: user_name.clone(),
                expires_at: *expires_at,
            },
            DocumentEventKind::LockReleased => CollabMessage::LockReleased {
                document_id: event.document_id,
            },
            DocumentEventKind::PresenceChanged => {
                // Presence events carry no payload; deliver the current
                // liveness-filtered snapshot instead.
                let users: Vec<PresenceUser> =
                    PresenceRepo::list_active(&self.pool, event.document_id)
                        .await?
                        .into_iter()
                        .map(PresenceUser::from)
                        .collect();
                CollabMessage::PresenceUpdate {
                    document_id: event.document_id,
                    users,
                }
            }
        };

        let delivered = self
            .ws_manager
            .send_to_document(event.organization_id, event.document_id, &message)
            .await;
        tracing::debug!(
            document_id = event.document_id,
            delivered,
            "Event fanned out"
        );

        Ok(())
    }
}
