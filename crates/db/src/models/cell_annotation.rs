//! Cell annotation models and lifecycle DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thematic_core::annotation::{ActionType, AiProvenance, AnnotationOrigin, AnnotationStatus};
use thematic_core::error::CoreError;
use thematic_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `cell_annotations` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CellAnnotation {
    pub id: DbId,
    pub text_cell_id: DbId,
    pub label_id: DbId,
    /// Human author; `None` for AI proposals.
    pub created_by: Option<DbId>,
    pub is_ai_generated: bool,
    pub ai_confidence: Option<f64>,
    pub ai_model: Option<String>,
    pub ai_provider: Option<String>,
    pub status: String,
    pub reviewed_by: Option<DbId>,
    pub reviewed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CellAnnotation {
    /// Parsed lifecycle status. The column is constrained by a CHECK, so a
    /// parse failure means the row was written outside this crate.
    pub fn lifecycle_status(&self) -> Result<AnnotationStatus, CoreError> {
        AnnotationStatus::from_str(&self.status)
    }
}

/// Review progress for one document (or every document). The first four
/// fields count AI proposals only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewCounts {
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub total: i64,
    /// Cells carrying at least one final (`active` or `accepted`) label.
    pub annotated_cells: i64,
}

impl ReviewCounts {
    /// Share of AI proposals that have been decided, as a percentage.
    pub fn completion_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.accepted + self.rejected) as f64 / self.total as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Store inputs
// ---------------------------------------------------------------------------

/// A new annotation as handed to the store. Built from an
/// [`AnnotationOrigin`] so the initial status always matches the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCellAnnotation {
    pub text_cell_id: DbId,
    pub label_id: DbId,
    pub created_by: Option<DbId>,
    pub is_ai_generated: bool,
    pub ai_confidence: Option<f64>,
    pub ai_model: Option<String>,
    pub ai_provider: Option<String>,
    pub status: AnnotationStatus,
}

impl NewCellAnnotation {
    pub fn new(text_cell_id: DbId, label_id: DbId, origin: AnnotationOrigin) -> Self {
        let status = origin.initial_status();
        match origin {
            AnnotationOrigin::Human { user_id } => Self {
                text_cell_id,
                label_id,
                created_by: Some(user_id),
                is_ai_generated: false,
                ai_confidence: None,
                ai_model: None,
                ai_provider: None,
                status,
            },
            AnnotationOrigin::Ai(AiProvenance {
                confidence,
                model,
                provider,
            }) => Self {
                text_cell_id,
                label_id,
                created_by: None,
                is_ai_generated: true,
                ai_confidence: Some(confidence),
                ai_model: model,
                ai_provider: provider,
                status,
            },
        }
    }
}

/// Outcome of inserting an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(CellAnnotation),
    /// An AI proposal for the same (cell, label) is already pending.
    DuplicatePending(CellAnnotation),
}

/// A review decision to apply atomically with its audit row.
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub annotation_id: DbId,
    /// The update only applies while the row is still in this status.
    pub expected_status: AnnotationStatus,
    pub new_status: AnnotationStatus,
    pub reviewer_id: DbId,
    pub action: ActionType,
    pub notes: Option<String>,
}

/// Replace a pending proposal with a different label.
#[derive(Debug, Clone)]
pub struct EditUpdate {
    pub annotation_id: DbId,
    pub reviewer_id: DbId,
    pub new_label_id: DbId,
    pub notes: Option<String>,
}

/// Both halves of an edit.
#[derive(Debug, Clone, Serialize)]
pub struct EditedAnnotation {
    pub original: CellAnnotation,
    pub replacement: CellAnnotation,
}

// ---------------------------------------------------------------------------
// DTOs (request payloads)
// ---------------------------------------------------------------------------

/// Human annotation request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHumanAnnotation {
    pub text_cell_id: DbId,
    pub label_id: DbId,
    pub user_id: DbId,
}

/// AI proposal request, as produced by the suggestion generator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAiAnnotation {
    pub text_cell_id: DbId,
    pub label_id: DbId,
    pub confidence: Option<f64>,
    pub model: Option<String>,
    pub provider: Option<String>,
}
