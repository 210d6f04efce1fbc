//! Document row model and request DTOs.

use quill_core::conflict::ConflictResolution;
use quill_core::tree::TreeRecord;
use quill_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `documents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: DbId,
    pub organization_id: DbId,
    pub name: String,
    pub parent_id: Option<DbId>,
    pub content: String,
    pub sort_order: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TreeRecord for Document {
    fn id(&self) -> DbId {
        self.id
    }
    fn parent_id(&self) -> Option<DbId> {
        self.parent_id
    }
    fn sort_order(&self) -> Option<i64> {
        self.sort_order
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// DTO for creating a document.
#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub name: String,
    pub parent_id: Option<DbId>,
    #[serde(default)]
    pub content: String,
    pub sort_order: Option<i64>,
}

/// DTO for renaming a document.
#[derive(Debug, Deserialize)]
pub struct RenameDocument {
    pub name: String,
}

/// DTO for replacing a document's content.
#[derive(Debug, Deserialize)]
pub struct UpdateContent {
    pub content: String,
}

/// DTO for re-parenting a document within its organization.
#[derive(Debug, Deserialize)]
pub struct MoveDocument {
    pub parent_id: Option<DbId>,
    pub sort_order: Option<i64>,
}

/// DTO for committing a conflict resolution.
///
/// `local_content` is the editor's unsaved buffer; the server side of the
/// three-way choice is the document's currently stored content.
#[derive(Debug, Deserialize)]
pub struct ResolveConflict {
    #[serde(flatten)]
    pub resolution: ConflictResolution,
    pub local_content: String,
}
