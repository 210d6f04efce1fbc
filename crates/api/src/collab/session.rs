//! Per-connection collaboration session.
//!
//! [`CollabSession`] owns everything one WebSocket connection is doing:
//! which documents it is present on and which it is actively editing. Each
//! active edit runs as a spawned task that renews the lease on an interval,
//! watches the event bus for remote writes, and accepts local-buffer
//! snapshots from the client. Dropping the session (socket closed) tears all
//! of it down: leases released, presence rows removed, tasks cancelled.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use quill_core::collaboration::{CollabMessage, LOCK_RENEW_INTERVAL_SECS};
use quill_core::types::{DbId, Timestamp};
use quill_db::repositories::{DocumentLockRepo, DocumentRepo};
use quill_events::{ChangeWatcher, DocumentEvent, DocumentEventKind};

use crate::collab::presence::PresenceTracker;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Handle to one spawned edit task.
struct EditSession {
    cancel: CancellationToken,
    snapshot_tx: mpsc::UnboundedSender<String>,
}

/// All collaboration state for one WebSocket connection.
pub struct CollabSession {
    state: AppState,
    conn_id: String,
    user: AuthUser,
    presence: PresenceTracker,
    edits: HashMap<DbId, EditSession>,
}

impl CollabSession {
    pub fn new(state: AppState, conn_id: String, user: AuthUser) -> Self {
        let presence = PresenceTracker::new(state.clone(), user.clone());
        Self {
            state,
            conn_id,
            user,
            presence,
            edits: HashMap::new(),
        }
    }

    /// Dispatch one inbound client message.
    ///
    /// Server-to-client message types arriving from a client are a protocol
    /// violation and are logged and dropped.
    pub async fn handle_message(&mut self, msg: CollabMessage) {
        match msg {
            CollabMessage::PresenceJoin { document_id } => self.join(document_id).await,
            CollabMessage::PresenceLeave { document_id } => self.leave(document_id).await,
            CollabMessage::EditStart { document_id } => self.start_edit(document_id).await,
            CollabMessage::EditStop { document_id } => self.stop_edit(document_id).await,
            CollabMessage::EditSnapshot {
                document_id,
                content,
            } => self.snapshot(document_id, content),
            other => {
                tracing::warn!(
                    conn_id = %self.conn_id,
                    user_id = self.user.user_id,
                    message = ?other,
                    "Ignoring server-to-client message received from client"
                );
            }
        }
    }

    /// Tear down the session: stop every edit and clear all presence.
    /// Called when the socket closes, cleanly or not.
    pub async fn shutdown(&mut self) {
        let editing: Vec<DbId> = self.edits.keys().copied().collect();
        for document_id in editing {
            self.stop_edit(document_id).await;
        }
        for document_id in self.presence.joined_snapshot().await {
            self.state
                .ws_manager
                .unsubscribe(&self.conn_id, document_id)
                .await;
        }
        self.presence.clear(&self.state, &self.user).await;
    }

    /// Verify the document exists in the caller's organization before any
    /// collaboration state is created for it.
    async fn load_document(&self, document_id: DbId) -> Option<(String, Timestamp)> {
        match DocumentRepo::get(&self.state.pool, self.user.organization_id, document_id).await {
            Ok(Some(doc)) => Some((doc.content, doc.updated_at)),
            Ok(None) => {
                tracing::warn!(
                    conn_id = %self.conn_id,
                    document_id,
                    "Collaboration message for unknown document"
                );
                None
            }
            Err(e) => {
                tracing::error!(document_id, error = %e, "Failed to load document");
                None
            }
        }
    }

    async fn join(&mut self, document_id: DbId) {
        if self.load_document(document_id).await.is_none() {
            return;
        }

        if let Err(e) = self
            .presence
            .join(&self.state, &self.user, document_id)
            .await
        {
            tracing::error!(document_id, error = %e, "Presence join failed");
            return;
        }
        self.state
            .ws_manager
            .subscribe(&self.conn_id, document_id)
            .await;
    }

    async fn leave(&mut self, document_id: DbId) {
        if let Err(e) = self
            .presence
            .leave(&self.state, &self.user, document_id)
            .await
        {
            tracing::error!(document_id, error = %e, "Presence leave failed");
        }
        // Keep the broadcast subscription while an edit is still running.
        if !self.edits.contains_key(&document_id) {
            self.state
                .ws_manager
                .unsubscribe(&self.conn_id, document_id)
                .await;
        }
    }

    /// Acquire the edit lease and spawn the edit task (renewal + remote
    /// change watching). Idempotent re-acquire by the same user is allowed;
    /// a live lease held by someone else produces a `lock.denied` reply.
    async fn start_edit(&mut self, document_id: DbId) {
        let Some((content, updated_at)) = self.load_document(document_id).await else {
            return;
        };

        let lock = match DocumentLockRepo::acquire(
            &self.state.pool,
            document_id,
            self.user.user_id,
            &self.user.user_name,
            self.user.avatar_url.as_deref(),
        )
        .await
        {
            Ok(lock) => lock,
            Err(e) => {
                tracing::error!(document_id, error = %e, "Lock acquisition failed");
                return;
            }
        };

        let Some(lock) = lock else {
            self.send_denied(document_id).await;
            return;
        };

        // Replacing a previous edit session for the same document (client
        // resumed editing) tears the old task down first.
        if let Some(existing) = self.edits.remove(&document_id) {
            existing.cancel.cancel();
        }

        self.state
            .ws_manager
            .subscribe(&self.conn_id, document_id)
            .await;
        self.state.event_bus.publish(DocumentEvent::new(
            document_id,
            self.user.organization_id,
            self.user.user_id,
            DocumentEventKind::LockAcquired {
                user_name: self.user.user_name.clone(),
                expires_at: lock.expires_at,
            },
        ));

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_edit_task(
            self.state.clone(),
            self.conn_id.clone(),
            self.user.clone(),
            document_id,
            content,
            updated_at,
            snapshot_rx,
            cancel.clone(),
        ));

        self.edits.insert(
            document_id,
            EditSession {
                cancel,
                snapshot_tx,
            },
        );

        tracing::info!(
            conn_id = %self.conn_id,
            user_id = self.user.user_id,
            document_id,
            "Edit session started"
        );
    }

    /// Stop the edit task and release the lease.
    async fn stop_edit(&mut self, document_id: DbId) {
        let Some(edit) = self.edits.remove(&document_id) else {
            return;
        };
        edit.cancel.cancel();

        match DocumentLockRepo::release(&self.state.pool, document_id, self.user.user_id).await {
            Ok(true) => {
                self.state.event_bus.publish(DocumentEvent::new(
                    document_id,
                    self.user.organization_id,
                    self.user.user_id,
                    DocumentEventKind::LockReleased,
                ));
            }
            // Already lost or expired; nothing to announce.
            Ok(false) => {}
            Err(e) => {
                tracing::error!(document_id, error = %e, "Lock release failed");
            }
        }

        // Presence outlives the edit; only drop the subscription if the user
        // is not viewing the document either.
        if !self.presence.contains(document_id).await {
            self.state
                .ws_manager
                .unsubscribe(&self.conn_id, document_id)
                .await;
        }

        tracing::info!(
            conn_id = %self.conn_id,
            user_id = self.user.user_id,
            document_id,
            "Edit session stopped"
        );
    }

    /// Forward a local-buffer snapshot to the edit task's watcher.
    fn snapshot(&mut self, document_id: DbId, content: String) {
        match self.edits.get(&document_id) {
            Some(edit) => {
                let _ = edit.snapshot_tx.send(content);
            }
            None => {
                tracing::debug!(
                    conn_id = %self.conn_id,
                    document_id,
                    "Snapshot for document without an active edit session"
                );
            }
        }
    }

    /// Reply to a failed acquisition with holder details.
    async fn send_denied(&self, document_id: DbId) {
        let holder = match DocumentLockRepo::get_active(&self.state.pool, document_id).await {
            Ok(holder) => holder,
            Err(e) => {
                tracing::error!(document_id, error = %e, "Failed to read lock holder");
                return;
            }
        };
        // The holder may have vanished between the failed upsert and this
        // read; the client simply retries edit.start.
        if let Some(holder) = holder {
            self.state
                .ws_manager
                .send_to(
                    &self.conn_id,
                    &CollabMessage::LockDenied {
                        document_id,
                        holder_user_id: holder.user_id,
                        holder_name: holder.user_name,
                        expires_at: holder.expires_at,
                    },
                )
                .await;
        }
    }
}

/// The spawned half of an edit session.
///
/// Renews the lease every [`LOCK_RENEW_INTERVAL_SECS`], watches the event
/// bus for remote content writes, and folds in snapshots of the client's
/// unsaved buffer. Exits when cancelled, when the lease is lost, or when the
/// owning session drops the snapshot channel.
#[allow(clippy::too_many_arguments)]
async fn run_edit_task(
    state: AppState,
    conn_id: String,
    user: AuthUser,
    document_id: DbId,
    initial_content: String,
    initial_updated_at: Timestamp,
    mut snapshot_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let mut watcher = ChangeWatcher::new(document_id, user.user_id, initial_content.clone(), true);
    // Consume the skip-initial slot with the state the client just loaded,
    // so the first real bus event is compared rather than swallowed.
    watcher.observe(&DocumentEvent::content_updated(
        document_id,
        user.organization_id,
        user.user_id,
        initial_content,
        initial_updated_at,
    ));

    let mut bus_rx = state.event_bus.subscribe();
    let mut renew = tokio::time::interval(Duration::from_secs(LOCK_RENEW_INTERVAL_SECS));
    // The first tick fires immediately; renewing straight after acquisition
    // is harmless, so no offset is needed.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = renew.tick() => {
                match DocumentLockRepo::renew(&state.pool, document_id, user.user_id).await {
                    Ok(Some(lock)) => {
                        tracing::debug!(
                            document_id,
                            user_id = user.user_id,
                            expires_at = %lock.expires_at,
                            "Edit lease renewed"
                        );
                    }
                    Ok(None) => {
                        // Lease lost (expired and taken over, or force
                        // released). A state transition, not an error: the
                        // client degrades to read-only.
                        tracing::info!(
                            document_id,
                            user_id = user.user_id,
                            "Edit lease lost"
                        );
                        state
                            .ws_manager
                            .send_to(&conn_id, &CollabMessage::LockLost {
                                document_id,
                                reason: "The edit lock could not be renewed".into(),
                            })
                            .await;
                        break;
                    }
                    Err(e) => {
                        // Transient failure: the lease is still live until
                        // its expiry, so keep going and retry next tick.
                        tracing::warn!(document_id, error = %e, "Lease renewal failed");
                    }
                }
            }

            snapshot = snapshot_rx.recv() => {
                match snapshot {
                    Some(content) => watcher.update_local_content(content),
                    None => break,
                }
            }

            event = bus_rx.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(change) = watcher.observe(&event) {
                            tracing::info!(
                                document_id,
                                editor = user.user_id,
                                remote_actor = change.actor_user_id,
                                "Remote change detected during edit"
                            );
                            state
                                .ws_manager
                                .send_to(&conn_id, &CollabMessage::ConflictDetected {
                                    document_id,
                                    server_content: change.content,
                                    server_updated_at: change.updated_at,
                                })
                                .await;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(document_id, skipped = n, "Edit watcher lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
