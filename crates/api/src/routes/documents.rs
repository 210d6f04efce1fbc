//! Route definitions for document management.
//!
//! Registered under `/documents`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::documents;
use crate::state::AppState;

/// Document routes, registered as `/documents`.
///
/// ```text
/// GET    /                       list_documents
/// POST   /                       create_document
/// GET    /tree                   get_document_tree
/// GET    /{id}                   get_document
/// DELETE /{id}                   delete_document
/// PUT    /{id}/name              rename_document
/// PUT    /{id}/content           update_content
/// PUT    /{id}/parent            move_document
/// POST   /{id}/merge-seed        get_merge_seed
/// POST   /{id}/resolve-conflict  resolve_conflict
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::create_document),
        )
        .route("/tree", get(documents::get_document_tree))
        .route(
            "/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/{id}/name", put(documents::rename_document))
        .route("/{id}/content", put(documents::update_content))
        .route("/{id}/parent", put(documents::move_document))
        .route("/{id}/merge-seed", post(documents::get_merge_seed))
        .route("/{id}/resolve-conflict", post(documents::resolve_conflict))
}
