//! Collaborative-editing constants, lease policy, and message protocol.
//!
//! This module lives in `core` (zero internal deps) so that the API layer,
//! repository layer, WebSocket handlers, and background sweepers all agree on
//! the same lease durations, presence windows, and wire messages.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Lease constants
// ---------------------------------------------------------------------------

/// How long an edit lease lasts from acquisition or renewal (5 minutes).
pub const LOCK_LEASE_SECS: i64 = 300;

/// How often an active editor renews its lease (in seconds). Kept well below
/// the lease duration so a single missed renewal does not lose the lock.
pub const LOCK_RENEW_INTERVAL_SECS: u64 = 60;

/// How often the expired-lock sweeper runs (in seconds). The sweep is purely
/// hygienic: every reader filters expired rows at read time regardless.
pub const LOCK_CLEANUP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Presence constants
// ---------------------------------------------------------------------------

/// How often a viewing client's heartbeat refreshes `last_active` (seconds).
pub const PRESENCE_HEARTBEAT_SECS: u64 = 30;

/// Presence entries older than this are treated as absent by every reader,
/// whether or not the row still exists.
pub const PRESENCE_LIVENESS_WINDOW_SECS: i64 = 60;

/// Presence entries older than this are physically deleted by the scheduled
/// garbage collector. Deliberately larger than the liveness window.
pub const PRESENCE_STALE_WINDOW_SECS: i64 = 300;

// ---------------------------------------------------------------------------
// Lease policy
// ---------------------------------------------------------------------------

/// Returns `true` if a lease with the given expiry is past due at `now`.
///
/// Expiry is advisory-cooperative: no single authority deletes expired rows,
/// so every reader applies this check instead of trusting row presence.
pub fn lease_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    expires_at <= now
}

/// Compute the expiry for a lease granted or renewed at `now`.
pub fn lease_expiry(now: Timestamp) -> Timestamp {
    now + Duration::seconds(LOCK_LEASE_SECS)
}

/// Decide whether `requester` may take the lock given the current holder.
///
/// Granting is allowed when there is no lock, the existing lease has expired,
/// or the requester already holds it (idempotent re-acquire). The repository
/// evaluates the same predicate inside a single conditional upsert so two
/// racing acquirers cannot both win; this function is the reference form used
/// by handlers and tests.
pub fn grant_allowed(holder: Option<(DbId, Timestamp)>, requester: DbId, now: Timestamp) -> bool {
    match holder {
        None => true,
        Some((holder_id, expires_at)) => holder_id == requester || lease_expired(expires_at, now),
    }
}

// ---------------------------------------------------------------------------
// WebSocket message protocol
// ---------------------------------------------------------------------------

/// Messages exchanged over WebSocket for real-time collaboration.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator so
/// that clients can route messages by type string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CollabMessage {
    /// Client sends: user is now viewing this document.
    #[serde(rename = "presence.join")]
    PresenceJoin { document_id: DbId },

    /// Client sends: user is no longer viewing this document.
    #[serde(rename = "presence.leave")]
    PresenceLeave { document_id: DbId },

    /// Client sends: user wants to start editing (acquire the lease).
    #[serde(rename = "edit.start")]
    EditStart { document_id: DbId },

    /// Client sends: user stopped editing (release the lease).
    #[serde(rename = "edit.stop")]
    EditStop { document_id: DbId },

    /// Client sends: snapshot of the unsaved local edit buffer, so the
    /// server-side change watcher compares remote writes against what the
    /// editor actually sees.
    #[serde(rename = "edit.snapshot")]
    EditSnapshot { document_id: DbId, content: String },

    /// Server broadcasts: updated list of users viewing a document.
    #[serde(rename = "presence.update")]
    PresenceUpdate {
        document_id: DbId,
        users: Vec<PresenceUser>,
    },

    /// Server broadcasts: an edit lease was acquired on a document.
    #[serde(rename = "lock.acquired")]
    LockAcquired {
        document_id: DbId,
        user_id: DbId,
        user_name: String,
        expires_at: Timestamp,
    },

    /// Server broadcasts: the edit lease on a document was released.
    #[serde(rename = "lock.released")]
    LockReleased { document_id: DbId },

    /// Server sends to the requesting client: lease acquisition denied.
    #[serde(rename = "lock.denied")]
    LockDenied {
        document_id: DbId,
        holder_user_id: DbId,
        holder_name: String,
        expires_at: Timestamp,
    },

    /// Server sends to the holder: the lease could not be renewed and the
    /// session has degraded to read-only. Not an error, a state transition.
    #[serde(rename = "lock.lost")]
    LockLost { document_id: DbId, reason: String },

    /// Server broadcasts: a document's stored content changed. Read-only
    /// viewers apply this directly.
    #[serde(rename = "document.updated")]
    DocumentUpdated {
        document_id: DbId,
        content: String,
        updated_at: Timestamp,
        actor_user_id: DbId,
    },

    /// Server sends to an active editor: a remote write diverged from the
    /// local buffer. The editor must resolve, never silently lose edits.
    #[serde(rename = "conflict.detected")]
    ConflictDetected {
        document_id: DbId,
        server_content: String,
        server_updated_at: Timestamp,
    },
}

/// A user entry in a presence update broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceUser {
    pub user_id: DbId,
    pub user_name: String,
    pub avatar_url: Option<String>,
    pub last_active: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
