//! Per-connection presence bookkeeping.
//!
//! Tracks which documents a WebSocket connection has joined, refreshes their
//! `last_active` on a heartbeat interval, and removes the records when the
//! socket closes, whether or not the client managed to send `presence.leave`
//! first.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use quill_core::collaboration::PRESENCE_HEARTBEAT_SECS;
use quill_core::types::DbId;
use quill_db::repositories::PresenceRepo;
use quill_events::{DocumentEvent, DocumentEventKind};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// The set of documents one connection is present on.
///
/// Mutations write through to the `user_presence` table and publish a
/// `PresenceChanged` event so other viewers refresh their presence lists. A
/// spawned refresh task bumps `last_active` for every joined document each
/// heartbeat interval and republishes the change, keeping the records inside
/// the liveness window for as long as the connection is alive.
pub struct PresenceTracker {
    joined: Arc<RwLock<HashSet<DbId>>>,
    refresh_cancel: CancellationToken,
}

impl PresenceTracker {
    /// Create the tracker and spawn its heartbeat refresh task.
    pub fn new(state: AppState, user: AuthUser) -> Self {
        let joined = Arc::new(RwLock::new(HashSet::new()));
        let refresh_cancel = CancellationToken::new();

        tokio::spawn(run_refresh_loop(
            state,
            user,
            Arc::clone(&joined),
            refresh_cancel.clone(),
        ));

        Self {
            joined,
            refresh_cancel,
        }
    }

    /// Record (or refresh) presence on a document.
    ///
    /// A repeated join for the same document acts as a manual heartbeat: it
    /// bumps `last_active` without duplicating the row.
    pub async fn join(
        &self,
        state: &AppState,
        user: &AuthUser,
        document_id: DbId,
    ) -> Result<(), sqlx::Error> {
        PresenceRepo::heartbeat(
            &state.pool,
            document_id,
            user.user_id,
            &user.user_name,
            user.avatar_url.as_deref(),
        )
        .await?;

        self.joined.write().await.insert(document_id);

        // Every heartbeat announces, matching the HTTP heartbeat endpoint:
        // the snapshot carries `last_active`, so viewers only see fresh
        // liveness values if refreshes are republished.
        state.event_bus.publish(DocumentEvent::new(
            document_id,
            user.organization_id,
            user.user_id,
            DocumentEventKind::PresenceChanged,
        ));

        Ok(())
    }

    /// Remove presence from a document.
    pub async fn leave(
        &self,
        state: &AppState,
        user: &AuthUser,
        document_id: DbId,
    ) -> Result<(), sqlx::Error> {
        let left = PresenceRepo::leave(&state.pool, document_id, user.user_id).await?;
        self.joined.write().await.remove(&document_id);

        if left {
            state.event_bus.publish(DocumentEvent::new(
                document_id,
                user.organization_id,
                user.user_id,
                DocumentEventKind::PresenceChanged,
            ));
        }

        Ok(())
    }

    /// Stop the refresh task and remove presence from every joined document.
    /// Called on disconnect. Failures are logged and swallowed; they never
    /// block the teardown.
    pub async fn clear(&self, state: &AppState, user: &AuthUser) {
        self.refresh_cancel.cancel();

        let joined: Vec<DbId> = self.joined.write().await.drain().collect();
        for document_id in joined {
            match PresenceRepo::leave(&state.pool, document_id, user.user_id).await {
                Ok(true) => {
                    state.event_bus.publish(DocumentEvent::new(
                        document_id,
                        user.organization_id,
                        user.user_id,
                        DocumentEventKind::PresenceChanged,
                    ));
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        document_id,
                        user_id = user.user_id,
                        error = %e,
                        "Failed to clear presence on disconnect"
                    );
                }
            }
        }
    }

    /// Whether this connection is present on the given document.
    pub async fn contains(&self, document_id: DbId) -> bool {
        self.joined.read().await.contains(&document_id)
    }

    /// Snapshot of the documents this connection is present on.
    pub async fn joined_snapshot(&self) -> Vec<DbId> {
        self.joined.read().await.iter().copied().collect()
    }
}

/// Refresh `last_active` for every joined document on the heartbeat
/// interval and republish `PresenceChanged` for each. The republish keeps
/// other viewers' snapshots current: their copies carry `last_active`
/// values, and a viewer that dropped out of the liveness window without a
/// leave only disappears from screens when a later snapshot excludes them.
async fn run_refresh_loop(
    state: AppState,
    user: AuthUser,
    joined: Arc<RwLock<HashSet<DbId>>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(PRESENCE_HEARTBEAT_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let documents: Vec<DbId> = joined.read().await.iter().copied().collect();
                for document_id in documents {
                    match PresenceRepo::heartbeat(
                        &state.pool,
                        document_id,
                        user.user_id,
                        &user.user_name,
                        user.avatar_url.as_deref(),
                    )
                    .await
                    {
                        Ok(_) => {
                            state.event_bus.publish(DocumentEvent::new(
                                document_id,
                                user.organization_id,
                                user.user_id,
                                DocumentEventKind::PresenceChanged,
                            ));
                        }
                        Err(e) => {
                            tracing::warn!(
                                document_id,
                                user_id = user.user_id,
                                error = %e,
                                "Presence refresh failed"
                            );
                        }
                    }
                }
            }
        }
    }
}
