//! Integration tests for the lock and presence repositories against a real
//! database.
//!
//! The interesting behavior here lives in SQL predicates (the conditional
//! acquire upsert, the renew guard, the liveness window, the stale sweep),
//! so these tests need PostgreSQL. They are ignored by default; run them
//! with a `DATABASE_URL` pointing at a scratch server:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/quill_test cargo test -p quill-db -- --ignored
//! ```

use quill_core::collaboration::PRESENCE_STALE_WINDOW_SECS;
use sqlx::PgPool;

use quill_db::repositories::{DocumentLockRepo, PresenceRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_document(pool: &PgPool, organization_id: i64, name: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO documents (organization_id, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(organization_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Backdate a lock so its lease reads as expired.
async fn expire_lock(pool: &PgPool, document_id: i64) {
    sqlx::query(
        "UPDATE document_locks SET expires_at = NOW() - INTERVAL '1 second' \
         WHERE document_id = $1",
    )
    .bind(document_id)
    .execute(pool)
    .await
    .unwrap();
}

/// Backdate a presence record's `last_active` by `secs` seconds.
async fn age_presence(pool: &PgPool, document_id: i64, user_id: i64, secs: i64) {
    sqlx::query(
        "UPDATE user_presence \
         SET last_active = NOW() - ($3 || ' seconds')::interval \
         WHERE document_id = $1 AND user_id = $2",
    )
    .bind(document_id)
    .bind(user_id)
    .bind(secs.to_string())
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Lock acquisition
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_acquire_denies_second_user_while_lease_live(pool: PgPool) {
    let doc = seed_document(&pool, 1, "Contested").await;

    let granted = DocumentLockRepo::acquire(&pool, doc, 10, "Alice", None)
        .await
        .unwrap();
    assert!(granted.is_some(), "first acquire should be granted");

    let denied = DocumentLockRepo::acquire(&pool, doc, 20, "Bob", None)
        .await
        .unwrap();
    assert!(denied.is_none(), "second user must be denied while the lease is live");

    let active = DocumentLockRepo::get_active(&pool, doc).await.unwrap().unwrap();
    assert_eq!(active.user_id, 10, "the original holder keeps the lease");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_acquire_is_idempotent_for_holder(pool: PgPool) {
    let doc = seed_document(&pool, 1, "Reacquired").await;

    let first = DocumentLockRepo::acquire(&pool, doc, 10, "Alice", None)
        .await
        .unwrap()
        .unwrap();
    let second = DocumentLockRepo::acquire(&pool, doc, 10, "Alice", None)
        .await
        .unwrap()
        .expect("holder re-acquire should be granted");

    assert_eq!(second.user_id, 10);
    assert!(
        second.expires_at >= first.expires_at,
        "re-acquire refreshes the lease expiry"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_expired_lease_can_be_taken_over(pool: PgPool) {
    let doc = seed_document(&pool, 1, "Abandoned").await;

    DocumentLockRepo::acquire(&pool, doc, 10, "Alice", None)
        .await
        .unwrap()
        .unwrap();
    expire_lock(&pool, doc).await;

    let taken = DocumentLockRepo::acquire(&pool, doc, 20, "Bob", None)
        .await
        .unwrap()
        .expect("expired lease should be taken over");
    assert_eq!(taken.user_id, 20);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_renew_requires_a_live_lease_held_by_caller(pool: PgPool) {
    let doc = seed_document(&pool, 1, "Renewed").await;

    DocumentLockRepo::acquire(&pool, doc, 10, "Alice", None)
        .await
        .unwrap()
        .unwrap();

    let stranger = DocumentLockRepo::renew(&pool, doc, 20).await.unwrap();
    assert!(stranger.is_none(), "non-holders cannot renew");

    let holder = DocumentLockRepo::renew(&pool, doc, 10).await.unwrap();
    assert!(holder.is_some(), "the live holder renews");

    expire_lock(&pool, doc).await;
    let lapsed = DocumentLockRepo::renew(&pool, doc, 10).await.unwrap();
    assert!(lapsed.is_none(), "an expired lease cannot be renewed, only re-acquired");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_cleanup_expired_removes_only_expired_locks(pool: PgPool) {
    let stale_doc = seed_document(&pool, 1, "Stale").await;
    let live_doc = seed_document(&pool, 1, "Live").await;

    DocumentLockRepo::acquire(&pool, stale_doc, 10, "Alice", None)
        .await
        .unwrap()
        .unwrap();
    DocumentLockRepo::acquire(&pool, live_doc, 20, "Bob", None)
        .await
        .unwrap()
        .unwrap();
    expire_lock(&pool, stale_doc).await;

    let deleted = DocumentLockRepo::cleanup_expired(&pool).await.unwrap();
    assert_eq!(deleted, 1);

    let survivor = DocumentLockRepo::get_active(&pool, live_doc).await.unwrap();
    assert!(survivor.is_some(), "live lease survives the sweep");
}

// ---------------------------------------------------------------------------
// Presence windowing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_list_active_applies_liveness_window(pool: PgPool) {
    let doc = seed_document(&pool, 1, "Watched").await;

    PresenceRepo::heartbeat(&pool, doc, 10, "Alice", None).await.unwrap();
    PresenceRepo::heartbeat(&pool, doc, 20, "Bob", None).await.unwrap();
    // Push Bob past the 60s liveness window without deleting the row.
    age_presence(&pool, doc, 20, 120).await;

    let active = PresenceRepo::list_active(&pool, doc).await.unwrap();
    assert_eq!(active.len(), 1, "lapsed viewers are filtered at read time");
    assert_eq!(active[0].user_id, 10);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL server"]
async fn test_cleanup_stale_reports_affected_documents(pool: PgPool) {
    let vacated = seed_document(&pool, 7, "Vacated").await;
    let occupied = seed_document(&pool, 7, "Occupied").await;

    PresenceRepo::heartbeat(&pool, vacated, 10, "Alice", None).await.unwrap();
    PresenceRepo::heartbeat(&pool, vacated, 20, "Bob", None).await.unwrap();
    PresenceRepo::heartbeat(&pool, occupied, 30, "Carol", None).await.unwrap();
    age_presence(&pool, vacated, 10, PRESENCE_STALE_WINDOW_SECS + 60).await;
    age_presence(&pool, vacated, 20, PRESENCE_STALE_WINDOW_SECS + 60).await;

    let purged = PresenceRepo::cleanup_stale(&pool, PRESENCE_STALE_WINDOW_SECS)
        .await
        .unwrap();

    assert_eq!(purged.len(), 2, "both stale rows are reported");
    assert!(
        purged
            .iter()
            .all(|row| row.document_id == vacated && row.organization_id == 7),
        "purged rows carry the document and its organization"
    );

    let remaining = PresenceRepo::list_active(&pool, occupied).await.unwrap();
    assert_eq!(remaining.len(), 1, "fresh presence on other documents survives");
}
