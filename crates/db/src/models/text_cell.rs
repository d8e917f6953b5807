//! Text cell models and classification DTOs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thematic_core::classifier::QuestionType;
use thematic_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `text_cells` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TextCell {
    pub id: DbId,
    pub document_id: DbId,
    pub sheet_name: Option<String>,
    pub row_index: i32,
    pub column_index: i32,
    /// The question this cell answers (the spreadsheet column header).
    pub column_name: Option<String>,
    pub text_content: String,
    pub question_type: Option<String>,
    pub classification_confidence: Option<f64>,
    pub is_annotatable: Option<bool>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TextCell {
    pub fn is_classified(&self) -> bool {
        self.question_type.is_some()
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for ingesting a new text cell.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTextCell {
    pub document_id: DbId,
    pub sheet_name: Option<String>,
    pub row_index: i32,
    pub column_index: i32,
    pub column_name: Option<String>,
    pub text_content: String,
}

/// Classifier output to be written back onto one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellClassification {
    pub text_cell_id: DbId,
    pub question_type: QuestionType,
    pub confidence: f64,
    pub is_annotatable: bool,
}

/// Aggregate classification counts for a document (or every document).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationStats {
    pub total_cells: i64,
    pub annotatable: i64,
    pub non_annotatable: i64,
    pub not_classified: i64,
    /// Keyed by the stored `question_type` string. Every type is present,
    /// including those with no cells.
    pub by_type: BTreeMap<String, i64>,
}

impl Default for ClassificationStats {
    fn default() -> Self {
        Self {
            total_cells: 0,
            annotatable: 0,
            non_annotatable: 0,
            not_classified: 0,
            by_type: QuestionType::ALL
                .iter()
                .map(|t| (t.as_str().to_string(), 0))
                .collect(),
        }
    }
}

/// Row shape of the per-type count query.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionTypeCount {
    pub question_type: String,
    pub count: i64,
}
