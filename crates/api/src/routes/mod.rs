//! Route table for the API server.
//!
//! [`api_routes`] composes all `/api/v1` routes; health stays at the root.

use axum::routing::get;
use axum::Router;

pub mod collaboration;
pub mod documents;
pub mod health;

use crate::state::AppState;
use crate::ws;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint for real-time collaboration.
        .route("/ws", get(ws::ws_handler))
        // Document CRUD, tree, and conflict resolution.
        .nest("/documents", documents::router())
        // Edit locks and presence.
        .nest("/collaboration", collaboration::router())
}
