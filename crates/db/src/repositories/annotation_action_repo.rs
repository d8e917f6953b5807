//! Repository for the append-only `annotation_actions` audit log.
//!
//! Rows are only ever inserted, and always inside the transaction that makes
//! the change they describe.

use sqlx::PgPool;
use thematic_core::types::DbId;

use crate::models::annotation_action::{AnnotationAction, NewAnnotationAction};

/// Column list for `annotation_actions` queries.
const COLUMNS: &str = "\
    id, annotation_id, text_cell_id, label_id, action_type, from_status, to_status, \
    performed_by, target_user_id, notes, was_ai_generated, ai_confidence, ai_model, \
    ai_provider, created_at";

/// Provides insert and lookup for audit rows. There is no update or delete.
pub struct AnnotationActionRepo;

impl AnnotationActionRepo {
    /// Append an audit row within an existing transaction.
    pub async fn insert_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        action: &NewAnnotationAction,
    ) -> Result<AnnotationAction, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotation_actions \
                 (annotation_id, text_cell_id, label_id, action_type, from_status, to_status, \
                  performed_by, target_user_id, notes, was_ai_generated, ai_confidence, \
                  ai_model, ai_provider) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotationAction>(&query)
            .bind(action.annotation_id)
            .bind(action.text_cell_id)
            .bind(action.label_id)
            .bind(action.action_type.as_str())
            .bind(&action.from_status)
            .bind(&action.to_status)
            .bind(action.performed_by)
            .bind(action.target_user_id)
            .bind(&action.notes)
            .bind(action.was_ai_generated)
            .bind(action.ai_confidence)
            .bind(&action.ai_model)
            .bind(&action.ai_provider)
            .fetch_one(&mut **tx)
            .await
    }

    /// Audit history of one cell, oldest first.
    pub async fn list_for_cell(
        pool: &PgPool,
        text_cell_id: DbId,
    ) -> Result<Vec<AnnotationAction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotation_actions \
             WHERE text_cell_id = $1 \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, AnnotationAction>(&query)
            .bind(text_cell_id)
            .fetch_all(pool)
            .await
    }
}
