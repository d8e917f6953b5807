//! Repository for the `cell_annotations` table.
//!
//! Every state change is written together with its audit row in one
//! transaction. The duplicate-proposal guard relies on the partial unique
//! index `uq_cell_annotations_pending`: the insert uses
//! `ON CONFLICT ... DO NOTHING`, and an empty `RETURNING` means another
//! proposal for the same (cell, label) is already pending.

use sqlx::PgPool;
use thematic_core::annotation::{ActionType, AnnotationStatus};
use thematic_core::error::CoreError;
use thematic_core::types::DbId;

use crate::error::CurationError;
use crate::models::annotation_action::NewAnnotationAction;
use crate::models::cell_annotation::{
    CellAnnotation, EditUpdate, EditedAnnotation, InsertOutcome, NewCellAnnotation,
    ReviewCounts, ReviewUpdate,
};
use crate::repositories::AnnotationActionRepo;

/// Column list for `cell_annotations` queries.
const COLUMNS: &str = "\
    id, text_cell_id, label_id, created_by, is_ai_generated, ai_confidence, ai_model, \
    ai_provider, status, reviewed_by, reviewed_at, created_at, updated_at";

/// Attempts at resolving a pending duplicate before giving up. A retry is
/// only needed when the conflicting proposal is reviewed between our
/// insert and the lookup.
const MAX_INSERT_ATTEMPTS: usize = 3;

/// Partial unique index: one active human annotation per (cell, label, author).
const HUMAN_UNIQUE_INDEX: &str = "uq_cell_annotations_human";

/// Provides lifecycle persistence for cell annotations.
pub struct CellAnnotationRepo;

impl CellAnnotationRepo {
    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CellAnnotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cell_annotations WHERE id = $1");
        sqlx::query_as::<_, CellAnnotation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_cell(
        pool: &PgPool,
        text_cell_id: DbId,
    ) -> Result<Vec<CellAnnotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cell_annotations WHERE text_cell_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, CellAnnotation>(&query)
            .bind(text_cell_id)
            .fetch_all(pool)
            .await
    }

    /// AI proposals awaiting review, optionally for one document.
    pub async fn list_pending(
        pool: &PgPool,
        document_id: Option<DbId>,
    ) -> Result<Vec<CellAnnotation>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM cell_annotations a \
             JOIN text_cells c ON c.id = a.text_cell_id \
             WHERE a.status = $1 \
               AND ($2::BIGINT IS NULL OR c.document_id = $2) \
             ORDER BY a.created_at, a.id",
            cols = prefixed_columns("a")
        );
        sqlx::query_as::<_, CellAnnotation>(&query)
            .bind(AnnotationStatus::PendingReview.as_str())
            .bind(document_id)
            .fetch_all(pool)
            .await
    }

    /// Counts of AI proposals by review outcome, plus the number of cells
    /// with a final label.
    pub async fn review_counts(
        pool: &PgPool,
        document_id: Option<DbId>,
    ) -> Result<ReviewCounts, sqlx::Error> {
        let (pending, accepted, rejected, total, annotated_cells): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT \
                     COUNT(*) FILTER (WHERE a.is_ai_generated AND a.status = 'pending_review'), \
                     COUNT(*) FILTER (WHERE a.is_ai_generated AND a.status = 'accepted'), \
                     COUNT(*) FILTER (WHERE a.is_ai_generated AND a.status = 'rejected'), \
                     COUNT(*) FILTER (WHERE a.is_ai_generated), \
                     COUNT(DISTINCT a.text_cell_id) \
                         FILTER (WHERE a.status IN ('active', 'accepted')) \
                 FROM cell_annotations a \
                 JOIN text_cells c ON c.id = a.text_cell_id \
                 WHERE ($1::BIGINT IS NULL OR c.document_id = $1)",
            )
            .bind(document_id)
            .fetch_one(pool)
            .await?;

        Ok(ReviewCounts {
            pending,
            accepted,
            rejected,
            total,
            annotated_cells,
        })
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Insert a human annotation (status `active`) with its `create` audit row.
    ///
    /// A second annotation with the same label on the same cell by the same
    /// author is a [`CoreError::Conflict`].
    pub async fn insert_active(
        pool: &PgPool,
        new: &NewCellAnnotation,
    ) -> Result<CellAnnotation, CurationError> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO cell_annotations \
                 (text_cell_id, label_id, created_by, is_ai_generated, ai_confidence, \
                  ai_model, ai_provider, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let row = bind_new(sqlx::query_as::<_, CellAnnotation>(&query), new)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| duplicate_human_annotation(e, new.text_cell_id, new.label_id))?;

        AnnotationActionRepo::insert_inner(&mut tx, &NewAnnotationAction::created(&row)).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Insert an AI proposal (status `pending_review`), or return the proposal
    /// already pending for the same (cell, label).
    pub async fn insert_pending(
        pool: &PgPool,
        new: &NewCellAnnotation,
    ) -> Result<InsertOutcome, CurationError> {
        let insert = format!(
            "INSERT INTO cell_annotations \
                 (text_cell_id, label_id, created_by, is_ai_generated, ai_confidence, \
                  ai_model, ai_provider, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (text_cell_id, label_id) WHERE status = 'pending_review' DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let existing = format!(
            "SELECT {COLUMNS} FROM cell_annotations \
             WHERE text_cell_id = $1 AND label_id = $2 AND status = 'pending_review'"
        );

        for _ in 0..MAX_INSERT_ATTEMPTS {
            let mut tx = pool.begin().await?;
            let inserted = bind_new(sqlx::query_as::<_, CellAnnotation>(&insert), new)
                .fetch_optional(&mut *tx)
                .await?;

            if let Some(row) = inserted {
                let action = NewAnnotationAction::created(&row);
                AnnotationActionRepo::insert_inner(&mut tx, &action).await?;
                tx.commit().await?;
                return Ok(InsertOutcome::Created(row));
            }
            tx.rollback().await?;

            let pending = sqlx::query_as::<_, CellAnnotation>(&existing)
                .bind(new.text_cell_id)
                .bind(new.label_id)
                .fetch_optional(pool)
                .await?;
            if let Some(row) = pending {
                return Ok(InsertOutcome::DuplicatePending(row));
            }
        }

        Err(unsettled_proposal(new.text_cell_id, new.label_id))
    }

    // -----------------------------------------------------------------------
    // Review
    // -----------------------------------------------------------------------

    /// Apply a review decision if the row is still in `expected_status`.
    ///
    /// Returns `None` (and changes nothing) when the row is missing or its
    /// status moved on concurrently.
    pub async fn apply_review(
        pool: &PgPool,
        update: &ReviewUpdate,
    ) -> Result<Option<CellAnnotation>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(current) =
            Self::lock_with_status(&mut tx, update.annotation_id, update.expected_status).await?
        else {
            return Ok(None);
        };

        let query = format!(
            "UPDATE cell_annotations SET \
                 status = $2, reviewed_by = $3, reviewed_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, CellAnnotation>(&query)
            .bind(update.annotation_id)
            .bind(update.new_status.as_str())
            .bind(update.reviewer_id)
            .fetch_one(&mut *tx)
            .await?;

        let action = NewAnnotationAction::for_annotation(
            &current,
            update.action,
            Some(update.reviewer_id),
            Some(update.new_status.as_str()),
        )
        .with_notes(update.notes.clone());
        AnnotationActionRepo::insert_inner(&mut tx, &action).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Reject a pending proposal and write an `active` replacement with the
    /// new label, authored by the reviewer. One `edit` audit row covers both.
    pub async fn replace_with_label(
        pool: &PgPool,
        edit: &EditUpdate,
    ) -> Result<Option<EditedAnnotation>, CurationError> {
        let mut tx = pool.begin().await?;

        let Some(current) =
            Self::lock_with_status(&mut tx, edit.annotation_id, AnnotationStatus::PendingReview)
                .await?
        else {
            return Ok(None);
        };

        let reject = format!(
            "UPDATE cell_annotations SET \
                 status = $2, reviewed_by = $3, reviewed_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let original = sqlx::query_as::<_, CellAnnotation>(&reject)
            .bind(edit.annotation_id)
            .bind(AnnotationStatus::Rejected.as_str())
            .bind(edit.reviewer_id)
            .fetch_one(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO cell_annotations \
                 (text_cell_id, label_id, created_by, is_ai_generated, ai_confidence, \
                  ai_model, ai_provider, status, reviewed_by, reviewed_at) \
             VALUES ($1, $2, $3, FALSE, $4, $5, $6, $7, $3, NOW()) \
             RETURNING {COLUMNS}"
        );
        let replacement = sqlx::query_as::<_, CellAnnotation>(&insert)
            .bind(current.text_cell_id)
            .bind(edit.new_label_id)
            .bind(edit.reviewer_id)
            .bind(current.ai_confidence)
            .bind(&current.ai_model)
            .bind(&current.ai_provider)
            .bind(AnnotationStatus::Active.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                duplicate_human_annotation(e, current.text_cell_id, edit.new_label_id)
            })?;

        let notes = edit.notes.clone().or_else(|| {
            Some(format!(
                "label {} replaced by {} (annotation {})",
                current.label_id, edit.new_label_id, replacement.id
            ))
        });
        let mut action = NewAnnotationAction::for_annotation(
            &current,
            ActionType::Edit,
            Some(edit.reviewer_id),
            Some(AnnotationStatus::Rejected.as_str()),
        )
        .with_notes(notes);
        action.label_id = Some(edit.new_label_id);
        AnnotationActionRepo::insert_inner(&mut tx, &action).await?;

        tx.commit().await?;
        Ok(Some(EditedAnnotation {
            original,
            replacement,
        }))
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Hard-delete an annotation after writing its `delete` audit row.
    /// Returns the deleted row, or `None` if it did not exist.
    pub async fn delete(
        pool: &PgPool,
        id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<Option<CellAnnotation>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM cell_annotations WHERE id = $1 FOR UPDATE");
        let Some(current) = sqlx::query_as::<_, CellAnnotation>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let action =
            NewAnnotationAction::for_annotation(&current, ActionType::Delete, performed_by, None);
        AnnotationActionRepo::insert_inner(&mut tx, &action).await?;

        sqlx::query("DELETE FROM cell_annotations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(current))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Lock a row and return it only if it is in `status`.
    async fn lock_with_status(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        status: AnnotationStatus,
    ) -> Result<Option<CellAnnotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cell_annotations WHERE id = $1 AND status = $2 FOR UPDATE"
        );
        sqlx::query_as::<_, CellAnnotation>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut **tx)
            .await
    }
}

fn bind_new<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, CellAnnotation, sqlx::postgres::PgArguments>,
    new: &'q NewCellAnnotation,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, CellAnnotation, sqlx::postgres::PgArguments> {
    query
        .bind(new.text_cell_id)
        .bind(new.label_id)
        .bind(new.created_by)
        .bind(new.is_ai_generated)
        .bind(new.ai_confidence)
        .bind(&new.ai_model)
        .bind(&new.ai_provider)
        .bind(new.status.as_str())
}

fn prefixed_columns(alias: &str) -> String {
    COLUMNS
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turn a hit on [`HUMAN_UNIQUE_INDEX`] into a conflict. Other errors pass
/// through as database errors.
fn duplicate_human_annotation(
    err: sqlx::Error,
    text_cell_id: DbId,
    label_id: DbId,
) -> CurationError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.constraint() == Some(HUMAN_UNIQUE_INDEX) => {
            CoreError::Conflict(format!(
                "Label {label_id} is already attached to text cell {text_cell_id} by this user"
            ))
            .into()
        }
        _ => err.into(),
    }
}

/// Every insert attempt lost to a proposal that was reviewed before it
/// could be read back.
fn unsettled_proposal(text_cell_id: DbId, label_id: DbId) -> CurationError {
    CoreError::Internal(format!(
        "Could not settle pending proposal for text cell {text_cell_id} and label {label_id} \
         after {MAX_INSERT_ATTEMPTS} attempts"
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn unsettled_proposal_is_an_internal_error() {
        let err = unsettled_proposal(4, 9);
        assert_matches!(
            err,
            CurationError::Core(CoreError::Internal(msg)) if msg.contains("text cell 4 and label 9")
        );
    }

    #[test]
    fn prefixed_columns_qualify_every_column() {
        let columns = prefixed_columns("ca");
        assert!(columns.starts_with("ca.id, ca.text_cell_id"));
        assert_eq!(columns.matches("ca.").count(), COLUMNS.split(',').count());
    }
}
