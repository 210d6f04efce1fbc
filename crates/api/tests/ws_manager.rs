//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades. They verify add/remove semantics,
//! subscription-scoped delivery, organization isolation, heartbeat pruning,
//! and graceful shutdown behaviour.

use assert_matches::assert_matches;
use axum::extract::ws::Message;
use quill_api::ws::WsManager;
use quill_core::collaboration::CollabMessage;

const ORG_A: i64 = 1;
const ORG_B: i64 = 2;

fn released(document_id: i64) -> CollabMessage {
    CollabMessage::LockReleased { document_id }
}

/// Decode a Text frame back into a protocol message.
fn decode(msg: Message) -> CollabMessage {
    match msg {
        Message::Text(text) => serde_json::from_str(&text).expect("valid protocol JSON"),
        other => panic!("Expected Text frame, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: new manager starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() and remove() adjust the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_adjust_connection_count() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), 10, ORG_A).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() with unknown ID is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), 10, ORG_A).await;
    manager.remove("nonexistent").await;

    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: send_to_document() only reaches subscribed connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_document_requires_subscription() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 10, ORG_A).await;
    let mut rx2 = manager.add("conn-2".to_string(), 11, ORG_A).await;

    manager.subscribe("conn-1", 42).await;

    let sent = manager.send_to_document(ORG_A, 42, &released(42)).await;
    assert_eq!(sent, 1);

    let msg = rx1.recv().await.expect("subscriber should receive");
    assert_eq!(decode(msg), released(42));

    // conn-2 never subscribed; its channel stays empty.
    assert!(rx2.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: send_to_document() never crosses organization boundaries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_document_is_organization_scoped() {
    let manager = WsManager::new();

    let mut rx_a = manager.add("conn-a".to_string(), 10, ORG_A).await;
    let mut rx_b = manager.add("conn-b".to_string(), 20, ORG_B).await;

    // Both subscribe to the same document id.
    manager.subscribe("conn-a", 7).await;
    manager.subscribe("conn-b", 7).await;

    let sent = manager.send_to_document(ORG_A, 7, &released(7)).await;
    assert_eq!(sent, 1);

    assert_eq!(decode(rx_a.recv().await.expect("org A receives")), released(7));
    assert!(rx_b.try_recv().is_err(), "Other organization must not receive");
}

// ---------------------------------------------------------------------------
// Test: unsubscribe() stops delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let manager = WsManager::new();

    let mut rx = manager.add("conn-1".to_string(), 10, ORG_A).await;
    manager.subscribe("conn-1", 42).await;
    manager.unsubscribe("conn-1", 42).await;

    let sent = manager.send_to_document(ORG_A, 42, &released(42)).await;
    assert_eq!(sent, 0);
    assert!(rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: send_to() targets a single connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_targets_single_connection() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 10, ORG_A).await;
    let mut rx2 = manager.add("conn-2".to_string(), 11, ORG_A).await;

    let lost = CollabMessage::LockLost {
        document_id: 5,
        reason: "The edit lock could not be renewed".into(),
    };
    assert!(manager.send_to("conn-1", &lost).await);
    assert!(!manager.send_to("nonexistent", &lost).await);

    assert_eq!(decode(rx1.recv().await.expect("target receives")), lost);
    assert!(rx2.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: closed channels are skipped, then pruned by ping_all()
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dead_connections_are_skipped_and_pruned() {
    let manager = WsManager::new();

    let rx1 = manager.add("conn-1".to_string(), 10, ORG_A).await;
    let mut rx2 = manager.add("conn-2".to_string(), 11, ORG_A).await;
    manager.subscribe("conn-1", 3).await;
    manager.subscribe("conn-2", 3).await;

    // Drop rx1 to close its channel.
    drop(rx1);

    // Delivery skips the dead channel without panicking.
    let sent = manager.send_to_document(ORG_A, 3, &released(3)).await;
    assert_eq!(sent, 1);
    assert_eq!(decode(rx2.recv().await.expect("live conn receives")), released(3));

    // The heartbeat sweep removes the dead connection.
    let pruned = manager.ping_all().await;
    assert_eq!(pruned, 1);
    assert_eq!(manager.connection_count().await, 1);

    // The live connection got the ping.
    let msg = rx2.recv().await.expect("live conn receives ping");
    assert_matches!(msg, Message::Ping(_));
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 10, ORG_A).await;
    let mut rx2 = manager.add("conn-2".to_string(), 11, ORG_B).await;
    assert_eq!(manager.connection_count().await, 2);

    manager.shutdown_all().await;

    // Connection count should be zero after shutdown.
    assert_eq!(manager.connection_count().await, 0);

    // Both receivers should have received a Close message.
    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert_matches!(msg1, Message::Close(None));

    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert_matches!(msg2, Message::Close(None));

    // After Close, the channel should be closed (no more messages).
    assert!(
        rx1.recv().await.is_none(),
        "Channel should be closed after shutdown"
    );
}

// ---------------------------------------------------------------------------
// Test: adding with duplicate ID replaces the previous connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_id_replaces_previous_connection() {
    let manager = WsManager::new();

    let _rx_old = manager.add("conn-1".to_string(), 10, ORG_A).await;
    assert_eq!(manager.connection_count().await, 1);

    // Re-add with the same ID -- should replace, not duplicate. The fresh
    // connection starts with no subscriptions.
    let mut rx_new = manager.add("conn-1".to_string(), 10, ORG_A).await;
    assert_eq!(manager.connection_count().await, 1);

    let sent = manager.send_to_document(ORG_A, 42, &released(42)).await;
    assert_eq!(sent, 0);

    manager.subscribe("conn-1", 42).await;
    let sent = manager.send_to_document(ORG_A, 42, &released(42)).await;
    assert_eq!(sent, 1);
    assert_eq!(decode(rx_new.recv().await.expect("new rx receives")), released(42));
}
