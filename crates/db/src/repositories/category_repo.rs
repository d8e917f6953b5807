//! Repository for the `categories` table.
//!
//! Recolouring, merging, and deleting a category also rewrites its labels,
//! so those operations run in a transaction.

use sqlx::PgPool;
use thematic_core::palette::NEUTRAL_GRAY;
use thematic_core::types::DbId;

use crate::models::category::{Category, CategoryRecolor};
use crate::models::merge::MergeOutcome;

/// Column list for `categories` queries.
const COLUMNS: &str = "id, name, description, color, is_active, created_at, updated_at";

/// Provides CRUD and bulk maintenance for categories.
pub struct CategoryRepo;

impl CategoryRepo {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        description: Option<&str>,
        color: &str,
    ) -> Result<Category, sqlx::Error> {
        let query = format!(
            "INSERT INTO categories (name, description, color) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(name)
            .bind(description)
            .bind(color)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM categories \
             WHERE $1 OR is_active \
             ORDER BY name"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(include_inactive)
            .fetch_all(pool)
            .await
    }

    /// Colours already taken by any category, active or not.
    pub async fn used_colors(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT color FROM categories ORDER BY id")
            .fetch_all(pool)
            .await
    }

    /// Update name, description, and active flag. Returns `None` if the
    /// category does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Category>, sqlx::Error> {
        let query = format!(
            "UPDATE categories SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 is_active = COALESCE($4, is_active) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Change a category's colour. Labels that were showing the old colour
    /// follow it; labels with a custom colour keep theirs unless `force`.
    pub async fn recolor(
        pool: &PgPool,
        id: DbId,
        color: &str,
        force: bool,
    ) -> Result<Option<CategoryRecolor>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let old_color: Option<String> =
            sqlx::query_scalar("SELECT color FROM categories WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(old_color) = old_color else {
            return Ok(None);
        };

        let labels_updated = sqlx::query(
            "UPDATE labels SET color = $2 \
             WHERE category_id = $1 AND ($4 OR LOWER(color) = LOWER($3))",
        )
        .bind(id)
        .bind(color)
        .bind(&old_color)
        .bind(force)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let query = format!("UPDATE categories SET color = $2 WHERE id = $1 RETURNING {COLUMNS}");
        let category = sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(color)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(CategoryRecolor {
            category,
            labels_updated,
        }))
    }

    /// Move every label of `source_ids` into `target_id` and delete the
    /// sources. Labels that inherited their old category's colour take the
    /// target's colour. Reports the number of labels moved.
    pub async fn merge(
        pool: &PgPool,
        source_ids: &[DbId],
        target_id: DbId,
    ) -> Result<MergeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM categories WHERE id = ANY($1) OR id = $2 FOR UPDATE",
        )
        .bind(source_ids)
        .bind(target_id)
        .fetch_all(&mut *tx)
        .await?;
        if let Some(missing) = std::iter::once(&target_id)
            .chain(source_ids)
            .find(|id| !existing.contains(id))
        {
            return Ok(MergeOutcome::Missing(*missing));
        }

        let moved = sqlx::query(
            "UPDATE labels l SET \
                 category_id = t.id, \
                 color = CASE WHEN LOWER(l.color) = LOWER(s.color) THEN t.color ELSE l.color END \
             FROM categories s, categories t \
             WHERE l.category_id = s.id AND s.id = ANY($1) AND t.id = $2",
        )
        .bind(source_ids)
        .bind(target_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM categories WHERE id = ANY($1)")
            .bind(source_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(MergeOutcome::Merged(moved))
    }

    /// Delete a category; its labels become uncategorised. Labels that were
    /// inheriting the category colour fall back to neutral gray.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE labels l SET \
                 category_id = NULL, \
                 color = CASE WHEN LOWER(l.color) = LOWER(c.color) THEN $2 ELSE l.color END \
             FROM categories c \
             WHERE l.category_id = c.id AND c.id = $1",
        )
        .bind(id)
        .bind(NEUTRAL_GRAY)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
