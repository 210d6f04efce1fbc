//! Edit-lock and user-presence models and DTOs.

use quill_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// DocumentLock
// ---------------------------------------------------------------------------

/// A row from the `document_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentLock {
    pub document_id: DbId,
    pub user_id: DbId,
    pub user_name: String,
    pub avatar_url: Option<String>,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

/// DTO for acquiring, renewing, or releasing a lock over HTTP.
#[derive(Debug, Deserialize)]
pub struct LockActionRequest {
    pub document_id: DbId,
}

// ---------------------------------------------------------------------------
// UserPresence
// ---------------------------------------------------------------------------

/// A row from the `user_presence` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserPresence {
    pub document_id: DbId,
    pub user_id: DbId,
    pub user_name: String,
    pub avatar_url: Option<String>,
    pub last_active: Timestamp,
}

/// A presence row removed by the stale sweep, joined with the owning
/// document's organization so the sweeper can announce the change.
#[derive(Debug, Clone, FromRow)]
pub struct PurgedPresence {
    pub document_id: DbId,
    pub organization_id: DbId,
    pub user_id: DbId,
}

impl From<UserPresence> for quill_core::collaboration::PresenceUser {
    fn from(row: UserPresence) -> Self {
        Self {
            user_id: row.user_id,
            user_name: row.user_name,
            avatar_url: row.avatar_url,
            last_active: row.last_active,
        }
    }
}
