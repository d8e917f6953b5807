//! Repository for the `text_cells` table.
//!
//! Cells are ingested by the upload pipeline and afterwards only touched by
//! the classifier, so besides lookups this repo mostly writes classification
//! results and answers the "what should be annotated" queries.

use sqlx::PgPool;
use thematic_core::types::DbId;

use crate::models::text_cell::{
    CellClassification, ClassificationStats, CreateTextCell, QuestionTypeCount, TextCell,
};

/// Column list for `text_cells` queries.
const COLUMNS: &str = "\
    id, document_id, sheet_name, row_index, column_index, column_name, text_content, \
    question_type, classification_confidence, is_annotatable, created_at, updated_at";

/// Provides ingestion, lookup, and classification persistence for text cells.
pub struct TextCellRepo;

impl TextCellRepo {
    /// Insert a new, unclassified cell.
    pub async fn create(pool: &PgPool, input: &CreateTextCell) -> Result<TextCell, sqlx::Error> {
        let query = format!(
            "INSERT INTO text_cells \
                 (document_id, sheet_name, row_index, column_index, column_name, text_content) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TextCell>(&query)
            .bind(input.document_id)
            .bind(&input.sheet_name)
            .bind(input.row_index)
            .bind(input.column_index)
            .bind(&input.column_name)
            .bind(&input.text_content)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TextCell>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM text_cells WHERE id = $1");
        sqlx::query_as::<_, TextCell>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List cells, optionally scoped to one document and/or to cells the
    /// classifier has not seen yet.
    pub async fn list(
        pool: &PgPool,
        document_id: Option<DbId>,
        only_unclassified: bool,
    ) -> Result<Vec<TextCell>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM text_cells \
             WHERE ($1::BIGINT IS NULL OR document_id = $1) \
               AND (NOT $2 OR question_type IS NULL) \
             ORDER BY document_id, row_index, column_index, id"
        );
        sqlx::query_as::<_, TextCell>(&query)
            .bind(document_id)
            .bind(only_unclassified)
            .fetch_all(pool)
            .await
    }

    /// Cells to surface for annotation: annotatable (or not yet classified)
    /// with confidence at or above `min_confidence`. A NULL confidence is
    /// always included.
    pub async fn list_annotatable(
        pool: &PgPool,
        document_id: Option<DbId>,
        min_confidence: f64,
    ) -> Result<Vec<TextCell>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM text_cells \
             WHERE ($1::BIGINT IS NULL OR document_id = $1) \
               AND is_annotatable IS NOT FALSE \
               AND (classification_confidence IS NULL OR classification_confidence >= $2) \
             ORDER BY document_id, row_index, column_index, id"
        );
        sqlx::query_as::<_, TextCell>(&query)
            .bind(document_id)
            .bind(min_confidence)
            .fetch_all(pool)
            .await
    }

    /// Write a batch of classification results in one transaction.
    ///
    /// Returns the number of rows updated. Ids with no matching cell are
    /// skipped.
    pub async fn update_classifications(
        pool: &PgPool,
        batch: &[CellClassification],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut updated = 0;

        for item in batch {
            let result = sqlx::query(
                "UPDATE text_cells SET \
                     question_type = $2, \
                     classification_confidence = $3, \
                     is_annotatable = $4 \
                 WHERE id = $1",
            )
            .bind(item.text_cell_id)
            .bind(item.question_type.as_str())
            .bind(item.confidence)
            .bind(item.is_annotatable)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Aggregate classification counts, optionally for one document.
    pub async fn classification_stats(
        pool: &PgPool,
        document_id: Option<DbId>,
    ) -> Result<ClassificationStats, sqlx::Error> {
        let (total_cells, annotatable, non_annotatable, not_classified): (i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT \
                     COUNT(*), \
                     COUNT(*) FILTER (WHERE is_annotatable = TRUE), \
                     COUNT(*) FILTER (WHERE is_annotatable = FALSE), \
                     COUNT(*) FILTER (WHERE question_type IS NULL) \
                 FROM text_cells \
                 WHERE ($1::BIGINT IS NULL OR document_id = $1)",
            )
            .bind(document_id)
            .fetch_one(pool)
            .await?;

        let counts = sqlx::query_as::<_, QuestionTypeCount>(
            "SELECT question_type, COUNT(*) AS count \
             FROM text_cells \
             WHERE question_type IS NOT NULL \
               AND ($1::BIGINT IS NULL OR document_id = $1) \
             GROUP BY question_type",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await?;

        let mut stats = ClassificationStats {
            total_cells,
            annotatable,
            non_annotatable,
            not_classified,
            ..ClassificationStats::default()
        };
        stats
            .by_type
            .extend(counts.into_iter().map(|row| (row.question_type, row.count)));
        Ok(stats)
    }
}
