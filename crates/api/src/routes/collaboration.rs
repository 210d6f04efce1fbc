//! Route definitions for edit locks and presence.
//!
//! Registered under `/collaboration`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::collaboration;
use crate::state::AppState;

/// Collaboration routes, registered as `/collaboration`.
///
/// ```text
/// POST /locks/acquire              acquire_lock
/// POST /locks/renew                renew_lock
/// POST /locks/release              release_lock
/// POST /locks/force-release        force_release_lock (admin)
/// GET  /locks/{document_id}        get_lock_status
/// POST /presence/heartbeat         presence_heartbeat
/// POST /presence/leave             presence_leave
/// GET  /presence/{document_id}     get_presence
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locks/acquire", post(collaboration::acquire_lock))
        .route("/locks/renew", post(collaboration::renew_lock))
        .route("/locks/release", post(collaboration::release_lock))
        .route(
            "/locks/force-release",
            post(collaboration::force_release_lock),
        )
        .route(
            "/locks/{document_id}",
            get(collaboration::get_lock_status),
        )
        .route(
            "/presence/heartbeat",
            post(collaboration::presence_heartbeat),
        )
        .route("/presence/leave", post(collaboration::presence_leave))
        .route("/presence/{document_id}", get(collaboration::get_presence))
}
