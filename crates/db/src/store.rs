//! The persistence seam used by every curation service.
//!
//! Each method is atomic on its own: a method either applies all of its
//! effects (including audit rows) or none of them. Services compose these
//! primitives and never hold a transaction across calls.

use async_trait::async_trait;
use thematic_core::types::DbId;

use crate::error::CurationError;
use crate::models::annotation_action::AnnotationAction;
use crate::models::category::{Category, CategoryRecolor};
use crate::models::cell_annotation::{
    CellAnnotation, EditUpdate, EditedAnnotation, InsertOutcome, NewCellAnnotation,
    ReviewCounts, ReviewUpdate,
};
use crate::models::label::{Label, LabelPatch, LabelWithUsage};
use crate::models::merge::MergeOutcome;
use crate::models::text_cell::{CellClassification, ClassificationStats, TextCell};

#[async_trait]
pub trait CurationStore: Send + Sync {
    async fn health_check(&self) -> Result<(), CurationError>;

    // -----------------------------------------------------------------------
    // Text cells
    // -----------------------------------------------------------------------

    async fn find_cell(&self, id: DbId) -> Result<Option<TextCell>, CurationError>;

    async fn list_cells(
        &self,
        document_id: Option<DbId>,
        only_unclassified: bool,
    ) -> Result<Vec<TextCell>, CurationError>;

    /// Write every classification or none.
    async fn update_cell_classifications(
        &self,
        batch: &[CellClassification],
    ) -> Result<u64, CurationError>;

    /// Annotatable or unclassified cells with confidence >= `min_confidence`;
    /// NULL confidence always qualifies.
    async fn list_annotatable_cells(
        &self,
        document_id: Option<DbId>,
        min_confidence: f64,
    ) -> Result<Vec<TextCell>, CurationError>;

    async fn classification_stats(
        &self,
        document_id: Option<DbId>,
    ) -> Result<ClassificationStats, CurationError>;

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    async fn find_category(&self, id: DbId) -> Result<Option<Category>, CurationError>;

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, CurationError>;

    /// Colours of every category, active or not, oldest first.
    async fn used_category_colors(&self) -> Result<Vec<String>, CurationError>;

    async fn insert_category(
        &self,
        name: &str,
        description: Option<&str>,
        color: &str,
    ) -> Result<Category, CurationError>;

    async fn update_category(
        &self,
        id: DbId,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Category>, CurationError>;

    /// Recolour a category together with the labels inheriting its colour.
    async fn recolor_category(
        &self,
        id: DbId,
        color: &str,
        force: bool,
    ) -> Result<Option<CategoryRecolor>, CurationError>;

    async fn merge_categories(
        &self,
        source_ids: &[DbId],
        target_id: DbId,
    ) -> Result<MergeOutcome, CurationError>;

    /// Delete a category; its labels become uncategorised.
    async fn delete_category(&self, id: DbId) -> Result<bool, CurationError>;

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    async fn find_label(&self, id: DbId) -> Result<Option<Label>, CurationError>;

    async fn list_labels(&self, include_inactive: bool) -> Result<Vec<Label>, CurationError>;

    async fn list_labels_with_usage(&self) -> Result<Vec<LabelWithUsage>, CurationError>;

    async fn insert_label(
        &self,
        name: &str,
        description: Option<&str>,
        category_id: Option<DbId>,
        color: &str,
    ) -> Result<Label, CurationError>;

    async fn update_label(&self, id: DbId, patch: &LabelPatch)
        -> Result<Option<Label>, CurationError>;

    async fn set_label_active(&self, id: DbId, is_active: bool) -> Result<bool, CurationError>;

    /// Hard delete. The store refuses while annotations reference the label.
    async fn delete_label(&self, id: DbId) -> Result<bool, CurationError>;

    async fn count_label_annotations(&self, id: DbId) -> Result<i64, CurationError>;

    /// Repoint all annotations of `source_ids` to `target_id` and delete the
    /// sources, atomically.
    async fn merge_labels(
        &self,
        source_ids: &[DbId],
        target_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, CurationError>;

    /// Repoint all annotations of `from_id` to `to_id`, keeping `from_id`.
    async fn reassign_label_annotations(
        &self,
        from_id: DbId,
        to_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, CurationError>;

    // -----------------------------------------------------------------------
    // Annotations
    // -----------------------------------------------------------------------

    async fn find_annotation(&self, id: DbId) -> Result<Option<CellAnnotation>, CurationError>;

    async fn list_cell_annotations(
        &self,
        text_cell_id: DbId,
    ) -> Result<Vec<CellAnnotation>, CurationError>;

    /// Insert with a `create` audit row. A pending proposal for an already
    /// pending (cell, label) resolves to [`InsertOutcome::DuplicatePending`]
    /// without a race between the check and the insert.
    async fn insert_annotation(&self, new: NewCellAnnotation)
        -> Result<InsertOutcome, CurationError>;

    /// Conditional status change plus audit row. `None` when the row is gone
    /// or no longer in `expected_status`.
    async fn apply_review(&self, update: ReviewUpdate)
        -> Result<Option<CellAnnotation>, CurationError>;

    /// Reject a pending proposal and insert its active replacement with a
    /// single `edit` audit row.
    async fn replace_with_label(
        &self,
        edit: EditUpdate,
    ) -> Result<Option<EditedAnnotation>, CurationError>;

    /// Hard delete plus `delete` audit row. Returns the removed row.
    async fn delete_annotation(
        &self,
        id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<Option<CellAnnotation>, CurationError>;

    async fn list_pending(&self, document_id: Option<DbId>)
        -> Result<Vec<CellAnnotation>, CurationError>;

    async fn review_counts(&self, document_id: Option<DbId>)
        -> Result<ReviewCounts, CurationError>;

    async fn list_cell_actions(
        &self,
        text_cell_id: DbId,
    ) -> Result<Vec<AnnotationAction>, CurationError>;
}
