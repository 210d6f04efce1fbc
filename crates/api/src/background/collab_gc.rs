//! Periodic cleanup of expired locks and stale presence rows.
//!
//! Spawns a background loop that deletes lock rows past their lease expiry
//! and presence rows whose `last_active` is older than the stale window.
//! The sweeps are hygienic for readers (every query already filters expired
//! leases and stale presence at read time), but a presence deletion is still
//! announced on the event bus: a client that vanished without a leave has no
//! other transition that would push a fresh snapshot to remaining viewers.
//! Runs on a fixed interval using `tokio::time::interval`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use quill_core::collaboration::{LOCK_CLEANUP_INTERVAL_SECS, PRESENCE_STALE_WINDOW_SECS};
use quill_db::repositories::{DocumentLockRepo, PresenceRepo};
use quill_events::{DocumentEvent, DocumentEventKind, EventBus};

/// Run the collaboration garbage-collection loop.
///
/// Both sweeps share one interval; they are equally cheap and there is no
/// benefit to staggering them. Runs until `cancel` is triggered.
pub async fn run(pool: PgPool, event_bus: Arc<EventBus>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = LOCK_CLEANUP_INTERVAL_SECS,
        presence_stale_secs = PRESENCE_STALE_WINDOW_SECS,
        "Collaboration GC started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(LOCK_CLEANUP_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Collaboration GC stopping");
                break;
            }
            _ = interval.tick() => {
                match DocumentLockRepo::cleanup_expired(&pool).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Collaboration GC: purged expired locks");
                    }
                    Ok(_) => {
                        tracing::debug!("Collaboration GC: no expired locks");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Collaboration GC: lock sweep failed");
                    }
                }

                match PresenceRepo::cleanup_stale(&pool, PRESENCE_STALE_WINDOW_SECS).await {
                    Ok(purged) if !purged.is_empty() => {
                        tracing::info!(
                            deleted = purged.len(),
                            "Collaboration GC: purged stale presence"
                        );
                        // One event per affected document; viewers that are
                        // still subscribed receive a fresh snapshot with the
                        // vanished users gone.
                        let mut announced = HashSet::new();
                        for row in purged {
                            if announced.insert(row.document_id) {
                                event_bus.publish(DocumentEvent::new(
                                    row.document_id,
                                    row.organization_id,
                                    row.user_id,
                                    DocumentEventKind::PresenceChanged,
                                ));
                            }
                        }
                    }
                    Ok(_) => {
                        tracing::debug!("Collaboration GC: no stale presence");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Collaboration GC: presence sweep failed");
                    }
                }
            }
        }
    }
}
