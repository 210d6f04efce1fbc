//! Repositories for the `document_locks` and `user_presence` tables.

use quill_core::collaboration::{LOCK_LEASE_SECS, PRESENCE_LIVENESS_WINDOW_SECS};
use quill_core::types::DbId;
use sqlx::PgPool;

use crate::models::collaboration::{DocumentLock, PurgedPresence, UserPresence};

// ---------------------------------------------------------------------------
// DocumentLockRepo
// ---------------------------------------------------------------------------

/// Column list for `document_locks` queries.
const LOCK_COLUMNS: &str = "document_id, user_id, user_name, avatar_url, \
                             acquired_at, expires_at";

/// Lease operations for exclusive document edit locks.
///
/// Acquisition is a single conditional upsert so that two clients racing to
/// acquire cannot both win; the grant predicate (no lock, expired lease, or
/// same holder) is evaluated inside the statement. Expiry stays cooperative:
/// every read filters `expires_at > NOW()` rather than trusting row
/// presence.
pub struct DocumentLockRepo;

impl DocumentLockRepo {
    /// Attempt to acquire the edit lease on a document.
    ///
    /// Grants with a fresh expiry when the document is unlocked, the existing
    /// lease has expired, or the caller already holds it (idempotent
    /// re-acquire). Returns `None` when another user holds a live lease; in
    /// that case nothing is written.
    pub async fn acquire(
        pool: &PgPool,
        document_id: DbId,
        user_id: DbId,
        user_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<Option<DocumentLock>, sqlx::Error> {
        let query = format!(
            "INSERT INTO document_locks \
                 (document_id, user_id, user_name, avatar_url, acquired_at, expires_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW() + INTERVAL '{LOCK_LEASE_SECS} seconds') \
             ON CONFLICT (document_id) DO UPDATE SET \
                 user_id = EXCLUDED.user_id, \
                 user_name = EXCLUDED.user_name, \
                 avatar_url = EXCLUDED.avatar_url, \
                 acquired_at = NOW(), \
                 expires_at = EXCLUDED.expires_at \
             WHERE document_locks.expires_at <= NOW() \
                OR document_locks.user_id = EXCLUDED.user_id \
             RETURNING {LOCK_COLUMNS}"
        );
        sqlx::query_as::<_, DocumentLock>(&query)
            .bind(document_id)
            .bind(user_id)
            .bind(user_name)
            .bind(avatar_url)
            .fetch_optional(pool)
            .await
    }

    /// Extend the lease expiry. Only the current holder of a non-expired
    /// lease can renew; returns `None` otherwise (the lease was lost).
    pub async fn renew(
        pool: &PgPool,
        document_id: DbId,
        user_id: DbId,
    ) -> Result<Option<DocumentLock>, sqlx::Error> {
        let query = format!(
            "UPDATE document_locks \
             SET expires_at = NOW() + INTERVAL '{LOCK_LEASE_SECS} seconds' \
             WHERE document_id = $1 AND user_id = $2 AND expires_at > NOW() \
             RETURNING {LOCK_COLUMNS}"
        );
        sqlx::query_as::<_, DocumentLock>(&query)
            .bind(document_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Voluntarily release the lease. Only the holder's row is deleted.
    ///
    /// Returns `true` if a lock was released.
    pub async fn release(
        pool: &PgPool,
        document_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM document_locks WHERE document_id = $1 AND user_id = $2",
        )
        .bind(document_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unconditionally delete the lease, whoever holds it. Reserved for
    /// organization administrators recovering from an unresponsive holder.
    pub async fn force_release(pool: &PgPool, document_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM document_locks WHERE document_id = $1")
            .bind(document_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the live lease for a document, or `None` if it is unlocked or the
    /// only row present has expired.
    pub async fn get_active(
        pool: &PgPool,
        document_id: DbId,
    ) -> Result<Option<DocumentLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM document_locks \
             WHERE document_id = $1 AND expires_at > NOW()"
        );
        sqlx::query_as::<_, DocumentLock>(&query)
            .bind(document_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete all expired lease rows. Returns the number deleted.
    ///
    /// Purely hygienic: readers already filter expired rows.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM document_locks WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// PresenceRepo
// ---------------------------------------------------------------------------

/// Column list for `user_presence` queries.
const PRESENCE_COLUMNS: &str = "document_id, user_id, user_name, avatar_url, last_active";

/// Advisory viewer-presence tracking.
pub struct PresenceRepo;

impl PresenceRepo {
    /// Record or refresh a user's presence on a document (heartbeat).
    pub async fn heartbeat(
        pool: &PgPool,
        document_id: DbId,
        user_id: DbId,
        user_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<UserPresence, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_presence \
                 (document_id, user_id, user_name, avatar_url, last_active) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (document_id, user_id) DO UPDATE SET \
                 last_active = NOW(), \
                 user_name = EXCLUDED.user_name, \
                 avatar_url = EXCLUDED.avatar_url \
             RETURNING {PRESENCE_COLUMNS}"
        );
        sqlx::query_as::<_, UserPresence>(&query)
            .bind(document_id)
            .bind(user_id)
            .bind(user_name)
            .bind(avatar_url)
            .fetch_one(pool)
            .await
    }

    /// Remove a user's presence record on leaving a document.
    ///
    /// Returns `true` if a record was deleted.
    pub async fn leave(
        pool: &PgPool,
        document_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM user_presence WHERE document_id = $1 AND user_id = $2",
        )
        .bind(document_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All users currently viewing a document, filtered to the liveness
    /// window. The filter is applied here, by every reader, so a record the
    /// sweeper has not reached yet is still treated as absent.
    pub async fn list_active(
        pool: &PgPool,
        document_id: DbId,
    ) -> Result<Vec<UserPresence>, sqlx::Error> {
        let query = format!(
            "SELECT {PRESENCE_COLUMNS} FROM user_presence \
             WHERE document_id = $1 \
               AND last_active > NOW() - INTERVAL '{PRESENCE_LIVENESS_WINDOW_SECS} seconds' \
             ORDER BY last_active DESC"
        );
        sqlx::query_as::<_, UserPresence>(&query)
            .bind(document_id)
            .fetch_all(pool)
            .await
    }

    /// Delete presence records older than `stale_secs`. Returns one row per
    /// deleted record, carrying the affected document and its organization,
    /// so the caller can announce the change to remaining viewers. Runs on a
    /// schedule decoupled from any client's lifetime so presence data from
    /// vanished clients does not grow unbounded.
    pub async fn cleanup_stale(
        pool: &PgPool,
        stale_secs: i64,
    ) -> Result<Vec<PurgedPresence>, sqlx::Error> {
        sqlx::query_as::<_, PurgedPresence>(
            "WITH purged AS ( \
                 DELETE FROM user_presence \
                 WHERE last_active < NOW() - ($1 || ' seconds')::interval \
                 RETURNING document_id, user_id \
             ) \
             SELECT purged.document_id, documents.organization_id, purged.user_id \
             FROM purged \
             JOIN documents ON documents.id = purged.document_id",
        )
        .bind(stale_secs.to_string())
        .fetch_all(pool)
        .await
    }
}
