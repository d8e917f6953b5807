//! Repository for the `labels` table, including label merge.
//!
//! A label that is referenced by any annotation cannot be deleted (the
//! foreign key is `ON DELETE RESTRICT`). Such labels leave the catalogue
//! through [`LabelRepo::merge`], which repoints their annotations onto a
//! target label and deletes them in a single transaction.

use sqlx::PgPool;
use thematic_core::annotation::ActionType;
use thematic_core::types::DbId;

use crate::models::label::{Label, LabelWithUsage};
use crate::models::merge::MergeOutcome;

/// Column list for `labels` queries.
const COLUMNS: &str = "id, name, description, category_id, color, is_active, created_at, updated_at";

/// Provides CRUD, usage counts, merge and reassignment for labels.
pub struct LabelRepo;

impl LabelRepo {
    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    pub async fn create(
        pool: &PgPool,
        name: &str,
        description: Option<&str>,
        category_id: Option<DbId>,
        color: &str,
    ) -> Result<Label, sqlx::Error> {
        let query = format!(
            "INSERT INTO labels (name, description, category_id, color) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Label>(&query)
            .bind(name)
            .bind(description)
            .bind(category_id)
            .bind(color)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Label>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM labels WHERE id = $1");
        sqlx::query_as::<_, Label>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Label>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM labels \
             WHERE $1 OR is_active \
             ORDER BY name"
        );
        sqlx::query_as::<_, Label>(&query)
            .bind(include_inactive)
            .fetch_all(pool)
            .await
    }

    /// Labels with their category and the number of annotations using them.
    pub async fn list_with_usage(pool: &PgPool) -> Result<Vec<LabelWithUsage>, sqlx::Error> {
        sqlx::query_as::<_, LabelWithUsage>(
            "SELECT l.id, l.name, l.description, l.category_id, \
                    c.name AS category_name, c.color AS category_color, \
                    l.color, l.is_active, \
                    COUNT(a.id) AS annotation_count \
             FROM labels l \
             LEFT JOIN categories c ON c.id = l.category_id \
             LEFT JOIN cell_annotations a ON a.label_id = l.id \
             GROUP BY l.id, c.id \
             ORDER BY c.name NULLS LAST, l.name",
        )
        .fetch_all(pool)
        .await
    }

    /// Apply a partial update. `category_id` is only written when
    /// `set_category` is true, so it can be cleared to NULL.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        description: Option<&str>,
        color: Option<&str>,
        set_category: bool,
        category_id: Option<DbId>,
    ) -> Result<Option<Label>, sqlx::Error> {
        let query = format!(
            "UPDATE labels SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 color = COALESCE($4, color), \
                 category_id = CASE WHEN $5 THEN $6 ELSE category_id END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Label>(&query)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(color)
            .bind(set_category)
            .bind(category_id)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete or restore a label. Returns `true` if a row changed.
    pub async fn set_active(pool: &PgPool, id: DbId, is_active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE labels SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a label. Fails with a foreign key violation while any
    /// annotation still references it.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_annotations(pool: &PgPool, id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM cell_annotations WHERE label_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Merge and reassignment
    // -----------------------------------------------------------------------

    /// Repoint every annotation of `source_ids` onto `target_id`, then
    /// delete the source labels. All or nothing.
    pub async fn merge(
        pool: &PgPool,
        source_ids: &[DbId],
        target_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if let Some(missing) = Self::lock_labels(&mut tx, source_ids, target_id).await? {
            return Ok(MergeOutcome::Missing(missing));
        }
        let colliding = Self::colliding_cells(&mut tx, source_ids, target_id).await?;
        if !colliding.is_empty() {
            return Ok(MergeOutcome::Colliding(colliding));
        }

        let repointed = Self::repoint_inner(&mut tx, source_ids, target_id, performed_by).await?;

        sqlx::query("DELETE FROM labels WHERE id = ANY($1)")
            .bind(source_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(?source_ids, target_id, repointed, "Labels merged");
        Ok(MergeOutcome::Merged(repointed))
    }

    /// Move every annotation of `from_id` onto `to_id` without deleting
    /// `from_id`.
    pub async fn reassign(
        pool: &PgPool,
        from_id: DbId,
        to_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let sources = [from_id];

        if let Some(missing) = Self::lock_labels(&mut tx, &sources, to_id).await? {
            return Ok(MergeOutcome::Missing(missing));
        }
        let colliding = Self::colliding_cells(&mut tx, &sources, to_id).await?;
        if !colliding.is_empty() {
            return Ok(MergeOutcome::Colliding(colliding));
        }

        let moved = Self::repoint_inner(&mut tx, &sources, to_id, performed_by).await?;

        tx.commit().await?;
        Ok(MergeOutcome::Merged(moved))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Lock the target and source rows. Returns the first id that does not
    /// exist, checking the target first.
    async fn lock_labels(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        source_ids: &[DbId],
        target_id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error> {
        let existing: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM labels WHERE id = ANY($1) OR id = $2 ORDER BY id FOR UPDATE",
        )
        .bind(source_ids)
        .bind(target_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(std::iter::once(&target_id)
            .chain(source_ids)
            .find(|id| !existing.contains(id))
            .copied())
    }

    /// Cells where moving `source_ids` onto `target_id` would break one of
    /// the partial unique indexes: two pending proposals, or two active
    /// human annotations by the same author.
    async fn colliding_cells(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        source_ids: &[DbId],
        target_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT text_cell_id \
             FROM cell_annotations \
             WHERE (label_id = ANY($1) OR label_id = $2) \
               AND (status = 'pending_review' \
                    OR (status = 'active' AND NOT is_ai_generated AND created_by IS NOT NULL)) \
             GROUP BY text_cell_id, \
                      CASE WHEN status = 'pending_review' THEN NULL ELSE created_by END \
             HAVING COUNT(*) > 1 \
             ORDER BY text_cell_id",
        )
        .bind(source_ids)
        .bind(target_id)
        .fetch_all(&mut **tx)
        .await
    }

    /// Record a `merge` audit row per moved annotation and repoint them.
    async fn repoint_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        source_ids: &[DbId],
        target_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query(
            "INSERT INTO annotation_actions \
                 (annotation_id, text_cell_id, label_id, action_type, from_status, to_status, \
                  performed_by, target_user_id, notes, was_ai_generated, ai_confidence, \
                  ai_model, ai_provider) \
             SELECT id, text_cell_id, $2, $3, status, status, \
                    $4, NULLIF(created_by, $4), 'merged from label ' || label_id, \
                    is_ai_generated, ai_confidence, ai_model, ai_provider \
             FROM cell_annotations \
             WHERE label_id = ANY($1)",
        )
        .bind(source_ids)
        .bind(target_id)
        .bind(ActionType::Merge.as_str())
        .bind(performed_by)
        .execute(&mut **tx)
        .await?;

        let result =
            sqlx::query("UPDATE cell_annotations SET label_id = $2 WHERE label_id = ANY($1)")
                .bind(source_ids)
                .bind(target_id)
                .execute(&mut **tx)
                .await?;

        Ok(result.rows_affected())
    }
}
