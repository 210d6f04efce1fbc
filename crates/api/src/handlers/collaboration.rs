//! Handlers for real-time collaboration: edit locks and user presence.
//!
//! Lock endpoints allow acquiring, renewing, releasing, force-releasing, and
//! querying the exclusive edit lease on a document. Presence endpoints allow
//! heartbeating and querying who is viewing a document. The WebSocket layer
//! offers the same operations for connected clients; these HTTP endpoints
//! back clients without a socket and administrative tooling.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use quill_core::error::CoreError;
use quill_core::types::DbId;
use quill_db::models::collaboration::LockActionRequest;
use quill_db::repositories::{DocumentLockRepo, DocumentRepo, PresenceRepo};
use quill_events::{DocumentEvent, DocumentEventKind};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Ensure the document exists in the caller's organization. All lock and
/// presence operations go through this, so one tenant can never touch
/// another's leases.
async fn require_document(
    state: &AppState,
    organization_id: DbId,
    document_id: DbId,
) -> AppResult<()> {
    DocumentRepo::get(&state.pool, organization_id, document_id)
        .await?
        .map(|_| ())
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Document",
            id: document_id,
        }))
}

// ---------------------------------------------------------------------------
// Lock Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/collaboration/locks/acquire
///
/// Attempt to acquire the edit lease on a document. Returns 409 if the
/// document is locked by another user with a live lease.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, input.document_id).await?;

    let lock = DocumentLockRepo::acquire(
        &state.pool,
        input.document_id,
        auth.user_id,
        &auth.user_name,
        auth.avatar_url.as_deref(),
    )
    .await?;

    match lock {
        Some(lock) => {
            tracing::info!(
                user_id = auth.user_id,
                document_id = input.document_id,
                expires_at = %lock.expires_at,
                "Lock acquired"
            );
            state.event_bus.publish(DocumentEvent::new(
                input.document_id,
                auth.organization_id,
                auth.user_id,
                DocumentEventKind::LockAcquired {
                    user_name: auth.user_name.clone(),
                    expires_at: lock.expires_at,
                },
            ));
            Ok(Json(DataResponse { data: lock }))
        }
        None => {
            // Lock held by someone else -- fetch holder info for the error.
            let holder = DocumentLockRepo::get_active(&state.pool, input.document_id).await?;

            match holder {
                Some(h) => Err(AppError::Core(CoreError::Conflict(format!(
                    "Document is being edited by {} until {}",
                    h.user_name, h.expires_at
                )))),
                // The holder released (or expired) between our upsert and
                // this read; the client can simply retry.
                None => Err(AppError::Core(CoreError::Conflict(
                    "Lock conflict detected; retry the acquisition".into(),
                ))),
            }
        }
    }
}

/// POST /api/v1/collaboration/locks/renew
///
/// Extend the lease expiry. Only the current holder of a live lease can
/// renew; a 409 means the lease was lost and the client must degrade its
/// edit session to read-only.
pub async fn renew_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, input.document_id).await?;

    let lock = DocumentLockRepo::renew(&state.pool, input.document_id, auth.user_id).await?;

    match lock {
        Some(lock) => {
            tracing::debug!(
                user_id = auth.user_id,
                document_id = input.document_id,
                new_expires_at = %lock.expires_at,
                "Lock renewed"
            );
            Ok(Json(DataResponse { data: lock }))
        }
        None => Err(AppError::Core(CoreError::Conflict(
            "You no longer hold the edit lock on this document".into(),
        ))),
    }
}

/// POST /api/v1/collaboration/locks/release
///
/// Voluntarily release a held lock. Only the lock holder can release.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, input.document_id).await?;

    let released = DocumentLockRepo::release(&state.pool, input.document_id, auth.user_id).await?;

    if !released {
        return Err(AppError::BadRequest(
            "You do not hold the edit lock on this document".into(),
        ));
    }

    tracing::info!(
        user_id = auth.user_id,
        document_id = input.document_id,
        "Lock released"
    );
    state.event_bus.publish(DocumentEvent::new(
        input.document_id,
        auth.organization_id,
        auth.user_id,
        DocumentEventKind::LockReleased,
    ));

    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": true }),
    }))
}

/// POST /api/v1/collaboration/locks/force-release
///
/// Unconditionally delete the lock, whoever holds it. Admin only; used to
/// recover from an unresponsive holder.
pub async fn force_release_lock(
    RequireAdmin(auth): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, input.document_id).await?;

    let released = DocumentLockRepo::force_release(&state.pool, input.document_id).await?;

    if released {
        tracing::info!(
            admin_user_id = auth.user_id,
            document_id = input.document_id,
            "Lock force-released"
        );
        state.event_bus.publish(DocumentEvent::new(
            input.document_id,
            auth.organization_id,
            auth.user_id,
            DocumentEventKind::LockReleased,
        ));
    }

    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": released }),
    }))
}

/// GET /api/v1/collaboration/locks/{document_id}
///
/// Check the lock status for a document. Returns the live lock or null;
/// an expired row is reported as null (expiry re-checked at read time).
pub async fn get_lock_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, document_id).await?;

    let lock = DocumentLockRepo::get_active(&state.pool, document_id).await?;
    Ok(Json(DataResponse { data: lock }))
}

// ---------------------------------------------------------------------------
// Presence Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/collaboration/presence/heartbeat
///
/// Record or refresh the caller's presence on a document.
pub async fn presence_heartbeat(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, input.document_id).await?;

    let presence = PresenceRepo::heartbeat(
        &state.pool,
        input.document_id,
        auth.user_id,
        &auth.user_name,
        auth.avatar_url.as_deref(),
    )
    .await?;

    state.event_bus.publish(DocumentEvent::new(
        input.document_id,
        auth.organization_id,
        auth.user_id,
        DocumentEventKind::PresenceChanged,
    ));

    Ok(Json(DataResponse { data: presence }))
}

/// POST /api/v1/collaboration/presence/leave
///
/// Remove the caller's presence record on a document.
pub async fn presence_leave(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, input.document_id).await?;

    let left = PresenceRepo::leave(&state.pool, input.document_id, auth.user_id).await?;

    if left {
        state.event_bus.publish(DocumentEvent::new(
            input.document_id,
            auth.organization_id,
            auth.user_id,
            DocumentEventKind::PresenceChanged,
        ));
    }

    Ok(Json(DataResponse {
        data: serde_json::json!({ "left": left }),
    }))
}

/// GET /api/v1/collaboration/presence/{document_id}
///
/// The users currently viewing a document, filtered to the liveness window.
pub async fn get_presence(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, document_id).await?;

    let users = PresenceRepo::list_active(&state.pool, document_id).await?;
    Ok(Json(DataResponse { data: users }))
}
