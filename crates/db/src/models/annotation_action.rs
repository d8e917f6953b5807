//! Audit log rows for the annotation lifecycle.

use serde::Serialize;
use sqlx::FromRow;
use thematic_core::annotation::ActionType;
use thematic_core::types::{DbId, Timestamp};

use super::cell_annotation::CellAnnotation;

/// A row from the `annotation_actions` table. Never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnnotationAction {
    pub id: DbId,
    pub annotation_id: Option<DbId>,
    pub text_cell_id: Option<DbId>,
    pub label_id: Option<DbId>,
    pub action_type: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub performed_by: Option<DbId>,
    pub target_user_id: Option<DbId>,
    pub notes: Option<String>,
    pub was_ai_generated: bool,
    pub ai_confidence: Option<f64>,
    pub ai_model: Option<String>,
    pub ai_provider: Option<String>,
    pub created_at: Timestamp,
}

/// Insert payload for an audit row.
#[derive(Debug, Clone)]
pub struct NewAnnotationAction {
    pub annotation_id: Option<DbId>,
    pub text_cell_id: Option<DbId>,
    pub label_id: Option<DbId>,
    pub action_type: ActionType,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub performed_by: Option<DbId>,
    pub target_user_id: Option<DbId>,
    pub notes: Option<String>,
    pub was_ai_generated: bool,
    pub ai_confidence: Option<f64>,
    pub ai_model: Option<String>,
    pub ai_provider: Option<String>,
}

impl NewAnnotationAction {
    /// Audit row describing `action` on `annotation`. The author of the
    /// annotation becomes the notification target when someone else acts.
    pub fn for_annotation(
        annotation: &CellAnnotation,
        action: ActionType,
        performed_by: Option<DbId>,
        to_status: Option<&str>,
    ) -> Self {
        let target_user_id = annotation
            .created_by
            .filter(|author| Some(*author) != performed_by);
        Self {
            annotation_id: Some(annotation.id),
            text_cell_id: Some(annotation.text_cell_id),
            label_id: Some(annotation.label_id),
            action_type: action,
            from_status: Some(annotation.status.clone()),
            to_status: to_status.map(str::to_string),
            performed_by,
            target_user_id,
            notes: None,
            was_ai_generated: annotation.is_ai_generated,
            ai_confidence: annotation.ai_confidence,
            ai_model: annotation.ai_model.clone(),
            ai_provider: annotation.ai_provider.clone(),
        }
    }

    /// `create` audit row for a freshly inserted annotation.
    pub fn created(annotation: &CellAnnotation) -> Self {
        Self {
            from_status: None,
            ..Self::for_annotation(
                annotation,
                ActionType::Create,
                annotation.created_by,
                Some(annotation.status.as_str()),
            )
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}
