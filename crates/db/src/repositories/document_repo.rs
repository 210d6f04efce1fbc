//! Repository for the `documents` table.
//!
//! Every operation is organization-scoped: callers pass the tenant id from
//! the authenticated identity and queries filter on it, so one organization
//! can never read or mutate another's documents.

use quill_core::types::DbId;
use sqlx::PgPool;

use crate::models::document::{CreateDocument, Document};

/// Column list for `documents` queries.
const DOCUMENT_COLUMNS: &str = "id, organization_id, name, parent_id, content, \
                                 sort_order, created_at, updated_at";

/// Organization-scoped CRUD for document records.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Fetch one document by id within an organization.
    pub async fn get(
        pool: &PgPool,
        organization_id: DbId,
        document_id: DbId,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE id = $1 AND organization_id = $2"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(document_id)
            .bind(organization_id)
            .fetch_optional(pool)
            .await
    }

    /// The organization's full flat document list (unsorted; the tree
    /// builder orders it).
    pub async fn list(pool: &PgPool, organization_id: DbId) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE organization_id = $1"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(organization_id)
            .fetch_all(pool)
            .await
    }

    /// Create a document. The caller has already validated the parent
    /// reference (existence, same organization).
    pub async fn create(
        pool: &PgPool,
        organization_id: DbId,
        input: &CreateDocument,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents (organization_id, name, parent_id, content, sort_order) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(organization_id)
            .bind(&input.name)
            .bind(input.parent_id)
            .bind(&input.content)
            .bind(input.sort_order)
            .fetch_one(pool)
            .await
    }

    /// Rename a document.
    pub async fn rename(
        pool: &PgPool,
        organization_id: DbId,
        document_id: DbId,
        name: &str,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "UPDATE documents SET name = $3, updated_at = NOW() \
             WHERE id = $1 AND organization_id = $2 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(document_id)
            .bind(organization_id)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Replace a document's content, bumping `updated_at`.
    ///
    /// This is the write the change watchers observe; the caller publishes
    /// the corresponding `document.updated` event with the returned row.
    pub async fn update_content(
        pool: &PgPool,
        organization_id: DbId,
        document_id: DbId,
        content: &str,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "UPDATE documents SET content = $3, updated_at = NOW() \
             WHERE id = $1 AND organization_id = $2 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(document_id)
            .bind(organization_id)
            .bind(content)
            .fetch_optional(pool)
            .await
    }

    /// Re-parent a document and optionally update its sibling sort key. The
    /// caller has already run the cycle check (`is_descendant`).
    pub async fn set_parent(
        pool: &PgPool,
        organization_id: DbId,
        document_id: DbId,
        parent_id: Option<DbId>,
        sort_order: Option<i64>,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "UPDATE documents SET parent_id = $3, sort_order = $4, updated_at = NOW() \
             WHERE id = $1 AND organization_id = $2 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(document_id)
            .bind(organization_id)
            .bind(parent_id)
            .bind(sort_order)
            .fetch_optional(pool)
            .await
    }

    /// Delete a document. The FK cascade removes the entire descendant
    /// subtree along with its locks and presence records.
    ///
    /// Returns `true` if the document existed.
    pub async fn delete(
        pool: &PgPool,
        organization_id: DbId,
        document_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE id = $1 AND organization_id = $2",
        )
        .bind(document_id)
        .bind(organization_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `true` if `candidate_id` lies in the subtree rooted at
    /// `ancestor_id` (including the root itself). Used by the move handler to
    /// reject re-parenting a document under its own descendant.
    pub async fn is_descendant(
        pool: &PgPool,
        organization_id: DbId,
        ancestor_id: DbId,
        candidate_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let (found,): (bool,) = sqlx::query_as(
            "WITH RECURSIVE subtree AS ( \
                 SELECT id FROM documents WHERE id = $1 AND organization_id = $2 \
                 UNION ALL \
                 SELECT d.id FROM documents d JOIN subtree s ON d.parent_id = s.id \
             ) \
             SELECT EXISTS(SELECT 1 FROM subtree WHERE id = $3)",
        )
        .bind(ancestor_id)
        .bind(organization_id)
        .bind(candidate_id)
        .fetch_one(pool)
        .await?;
        Ok(found)
    }
}
