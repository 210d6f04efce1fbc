//! Handlers for document CRUD, the navigation tree, and conflict resolution.
//!
//! Every operation is scoped to the caller's organization. Content writes
//! publish a `document.updated` event so change watchers and read-only
//! viewers observe them; the tree endpoint rebuilds the whole forest from
//! the flat list on every call rather than patching incrementally.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use quill_core::conflict::{merge_seed, resolved_content};
use quill_core::documents::{validate_content, validate_name};
use quill_core::error::CoreError;
use quill_core::tree::build_tree;
use quill_core::types::DbId;
use quill_db::models::document::{
    CreateDocument, Document, MoveDocument, RenameDocument, ResolveConflict, UpdateContent,
};
use quill_db::repositories::DocumentRepo;
use quill_events::DocumentEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireEditor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Fetch a document or return a typed 404.
async fn require_document(
    state: &AppState,
    organization_id: DbId,
    document_id: DbId,
) -> AppResult<Document> {
    DocumentRepo::get(&state.pool, organization_id, document_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Document",
            id: document_id,
        }))
}

// ---------------------------------------------------------------------------
// Read Endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/documents
///
/// The organization's flat document list, unsorted.
pub async fn list_documents(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let documents = DocumentRepo::list(&state.pool, auth.organization_id).await?;
    Ok(Json(DataResponse { data: documents }))
}

/// GET /api/v1/documents/tree
///
/// The organization's documents as an ordered forest for the sidebar.
pub async fn get_document_tree(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let documents = DocumentRepo::list(&state.pool, auth.organization_id).await?;
    Ok(Json(DataResponse {
        data: build_tree(documents),
    }))
}

/// GET /api/v1/documents/{id}
pub async fn get_document(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let document = require_document(&state, auth.organization_id, document_id).await?;
    Ok(Json(DataResponse { data: document }))
}

// ---------------------------------------------------------------------------
// Write Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/documents
///
/// Create a document. A declared parent must exist in the same organization.
pub async fn create_document(
    RequireEditor(auth): RequireEditor,
    State(state): State<AppState>,
    Json(input): Json<CreateDocument>,
) -> AppResult<impl IntoResponse> {
    validate_name(&input.name)?;
    validate_content(&input.content)?;

    if let Some(parent_id) = input.parent_id {
        require_document(&state, auth.organization_id, parent_id).await?;
    }

    let document = DocumentRepo::create(&state.pool, auth.organization_id, &input).await?;
    tracing::info!(
        user_id = auth.user_id,
        document_id = document.id,
        "Document created"
    );
    Ok(Json(DataResponse { data: document }))
}

/// PUT /api/v1/documents/{id}/name
pub async fn rename_document(
    RequireEditor(auth): RequireEditor,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Json(input): Json<RenameDocument>,
) -> AppResult<impl IntoResponse> {
    validate_name(&input.name)?;

    let document =
        DocumentRepo::rename(&state.pool, auth.organization_id, document_id, &input.name)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Document",
                id: document_id,
            }))?;
    Ok(Json(DataResponse { data: document }))
}

/// PUT /api/v1/documents/{id}/content
///
/// Replace the stored content (last-writer-wins) and publish the change so
/// active editors' watchers can detect a divergence.
pub async fn update_content(
    RequireEditor(auth): RequireEditor,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Json(input): Json<UpdateContent>,
) -> AppResult<impl IntoResponse> {
    validate_content(&input.content)?;

    let document = DocumentRepo::update_content(
        &state.pool,
        auth.organization_id,
        document_id,
        &input.content,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Document",
        id: document_id,
    }))?;

    state.event_bus.publish(DocumentEvent::content_updated(
        document.id,
        document.organization_id,
        auth.user_id,
        document.content.clone(),
        document.updated_at,
    ));

    Ok(Json(DataResponse { data: document }))
}

/// PUT /api/v1/documents/{id}/parent
///
/// Re-parent a document. Rejected when the new parent is the document itself
/// or one of its descendants (would create a cycle), or lives in another
/// organization.
pub async fn move_document(
    RequireEditor(auth): RequireEditor,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Json(input): Json<MoveDocument>,
) -> AppResult<impl IntoResponse> {
    require_document(&state, auth.organization_id, document_id).await?;

    if let Some(parent_id) = input.parent_id {
        require_document(&state, auth.organization_id, parent_id).await?;
        if DocumentRepo::is_descendant(&state.pool, auth.organization_id, document_id, parent_id)
            .await?
        {
            return Err(AppError::Core(CoreError::Validation(
                "Cannot move a document under itself or one of its descendants".into(),
            )));
        }
    }

    let document = DocumentRepo::set_parent(
        &state.pool,
        auth.organization_id,
        document_id,
        input.parent_id,
        input.sort_order,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Document",
        id: document_id,
    }))?;
    Ok(Json(DataResponse { data: document }))
}

/// DELETE /api/v1/documents/{id}
///
/// Deletes the document and its entire descendant subtree (FK cascade),
/// along with any locks and presence records on those documents.
pub async fn delete_document(
    RequireEditor(auth): RequireEditor,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deleted = DocumentRepo::delete(&state.pool, auth.organization_id, document_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Document",
            id: document_id,
        }));
    }
    tracing::info!(user_id = auth.user_id, document_id, "Document deleted");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "deleted": true }),
    }))
}

// ---------------------------------------------------------------------------
// Conflict Resolution Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/documents/{id}/merge-seed
///
/// Build the manual-merge starting buffer: the caller's local version and
/// the currently stored version under labeled headings.
pub async fn get_merge_seed(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Json(input): Json<UpdateContent>,
) -> AppResult<impl IntoResponse> {
    let document = require_document(&state, auth.organization_id, document_id).await?;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "seed": merge_seed(&input.content, &document.content) }),
    }))
}

/// POST /api/v1/documents/{id}/resolve-conflict
///
/// Commit the editor's conflict resolution: keep the local buffer, adopt the
/// server version, or persist a hand-edited merge. The resolved text is
/// written as the new content and returned so the client's edit buffer is
/// updated consistently.
pub async fn resolve_conflict(
    RequireEditor(auth): RequireEditor,
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Json(input): Json<ResolveConflict>,
) -> AppResult<impl IntoResponse> {
    let current = require_document(&state, auth.organization_id, document_id).await?;

    let resolved = resolved_content(&input.resolution, &input.local_content, &current.content);
    validate_content(&resolved)?;

    let document =
        DocumentRepo::update_content(&state.pool, auth.organization_id, document_id, &resolved)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Document",
                id: document_id,
            }))?;

    state.event_bus.publish(DocumentEvent::content_updated(
        document.id,
        document.organization_id,
        auth.user_id,
        document.content.clone(),
        document.updated_at,
    ));

    tracing::info!(
        user_id = auth.user_id,
        document_id,
        resolution = input.resolution.kind(),
        "Conflict resolved"
    );
    Ok(Json(DataResponse { data: document }))
}
