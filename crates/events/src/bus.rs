//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`DocumentEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.
//! The store guarantees per-document write ordering for a given subscriber
//! (broadcast preserves publish order); there is no cross-document ordering.

use quill_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// DocumentEvent
// ---------------------------------------------------------------------------

/// Something happened to a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEvent {
    /// The document this event concerns.
    pub document_id: DbId,
    /// The owning organization (subscribers never cross tenants).
    pub organization_id: DbId,
    /// The user whose action produced the event.
    pub actor_user_id: DbId,
    /// When the event was published (UTC).
    pub timestamp: Timestamp,
    /// What happened.
    pub kind: DocumentEventKind,
}

/// Event payloads, one variant per observable change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentEventKind {
    /// The stored content changed. Carries the new content so watchers and
    /// read-only views need no follow-up read.
    ContentUpdated {
        content: String,
        updated_at: Timestamp,
    },
    /// An edit lease was acquired.
    LockAcquired {
        user_name: String,
        expires_at: Timestamp,
    },
    /// The edit lease was released (voluntarily, forced, or expired).
    LockReleased,
    /// The viewer set changed (join, leave, or heartbeat reactivation).
    /// Subscribers re-read the liveness-filtered snapshot.
    PresenceChanged,
}

impl DocumentEvent {
    pub fn new(
        document_id: DbId,
        organization_id: DbId,
        actor_user_id: DbId,
        kind: DocumentEventKind,
    ) -> Self {
        Self {
            document_id,
            organization_id,
            actor_user_id,
            timestamp: chrono::Utc::now(),
            kind,
        }
    }

    pub fn content_updated(
        document_id: DbId,
        organization_id: DbId,
        actor_user_id: DbId,
        content: String,
        updated_at: Timestamp,
    ) -> Self {
        Self::new(
            document_id,
            organization_id,
            actor_user_id,
            DocumentEventKind::ContentUpdated {
                content,
                updated_at,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`DocumentEvent`].
pub struct EventBus {
    sender: broadcast::Sender<DocumentEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// the persisted record set remains the source of truth.
    pub fn publish(&self, event: DocumentEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(DocumentEvent::content_updated(
            42,
            1,
            7,
            "body".to_string(),
            chrono::Utc::now(),
        ));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.document_id, 42);
        assert_eq!(received.organization_id, 1);
        assert_eq!(received.actor_user_id, 7);
        match received.kind {
            DocumentEventKind::ContentUpdated { content, .. } => assert_eq!(content, "body"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DocumentEvent::new(5, 1, 2, DocumentEventKind::LockReleased));

        assert_eq!(rx1.recv().await.unwrap().document_id, 5);
        assert_eq!(rx2.recv().await.unwrap().document_id, 5);
    }

    #[tokio::test]
    async fn per_document_events_arrive_in_publish_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        for i in 0..3 {
            bus.publish(DocumentEvent::content_updated(
                9,
                1,
                2,
                format!("rev-{i}"),
                chrono::Utc::now(),
            ));
        }

        for i in 0..3 {
            let event = rx.recv().await.unwrap();
            match event.kind {
                DocumentEventKind::ContentUpdated { content, .. } => {
                    assert_eq!(content, format!("rev-{i}"));
                }
                other => panic!("unexpected kind: {other:?}"),
            }
        }
    }

    #[test]
    fn publish_without_subscribers_is_silently_dropped() {
        let bus = EventBus::default();
        bus.publish(DocumentEvent::new(1, 1, 1, DocumentEventKind::PresenceChanged));
    }
}
