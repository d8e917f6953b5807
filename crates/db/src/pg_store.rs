//! [`CurationStore`] backed by Postgres through the repositories.

use async_trait::async_trait;
use sqlx::PgPool;
use thematic_core::annotation::AnnotationStatus;
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
use crate::repositories::{
    AnnotationActionRepo, CategoryRepo, CellAnnotationRepo, LabelRepo, TextCellRepo,
};
use crate::store::CurationStore;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CurationStore for PgStore {
    async fn health_check(&self) -> Result<(), CurationError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    // --- text cells --------------------------------------------------------

    async fn find_cell(&self, id: DbId) -> Result<Option<TextCell>, CurationError> {
        Ok(TextCellRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_cells(
        &self,
        document_id: Option<DbId>,
        only_unclassified: bool,
    ) -> Result<Vec<TextCell>, CurationError> {
        Ok(TextCellRepo::list(&self.pool, document_id, only_unclassified).await?)
    }

    async fn update_cell_classifications(
        &self,
        batch: &[CellClassification],
    ) -> Result<u64, CurationError> {
        Ok(TextCellRepo::update_classifications(&self.pool, batch).await?)
    }

    async fn list_annotatable_cells(
        &self,
        document_id: Option<DbId>,
        min_confidence: f64,
    ) -> Result<Vec<TextCell>, CurationError> {
        Ok(TextCellRepo::list_annotatable(&self.pool, document_id, min_confidence).await?)
    }

    async fn classification_stats(
        &self,
        document_id: Option<DbId>,
    ) -> Result<ClassificationStats, CurationError> {
        Ok(TextCellRepo::classification_stats(&self.pool, document_id).await?)
    }

    // --- categories --------------------------------------------------------

    async fn find_category(&self, id: DbId) -> Result<Option<Category>, CurationError> {
        Ok(CategoryRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, CurationError> {
        Ok(CategoryRepo::list(&self.pool, include_inactive).await?)
    }

    async fn used_category_colors(&self) -> Result<Vec<String>, CurationError> {
        Ok(CategoryRepo::used_colors(&self.pool).await?)
    }

    async fn insert_category(
        &self,
        name: &str,
        description: Option<&str>,
        color: &str,
    ) -> Result<Category, CurationError> {
        Ok(CategoryRepo::create(&self.pool, name, description, color).await?)
    }

    async fn update_category(
        &self,
        id: DbId,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Category>, CurationError> {
        Ok(CategoryRepo::update(&self.pool, id, name, description, is_active).await?)
    }

    async fn recolor_category(
        &self,
        id: DbId,
        color: &str,
        force: bool,
    ) -> Result<Option<CategoryRecolor>, CurationError> {
        Ok(CategoryRepo::recolor(&self.pool, id, color, force).await?)
    }

    async fn merge_categories(
        &self,
        source_ids: &[DbId],
        target_id: DbId,
    ) -> Result<MergeOutcome, CurationError> {
        Ok(CategoryRepo::merge(&self.pool, source_ids, target_id).await?)
    }

    async fn delete_category(&self, id: DbId) -> Result<bool, CurationError> {
        Ok(CategoryRepo::delete(&self.pool, id).await?)
    }

    // --- labels ------------------------------------------------------------

    async fn find_label(&self, id: DbId) -> Result<Option<Label>, CurationError> {
        Ok(LabelRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_labels(&self, include_inactive: bool) -> Result<Vec<Label>, CurationError> {
        Ok(LabelRepo::list(&self.pool, include_inactive).await?)
    }

    async fn list_labels_with_usage(&self) -> Result<Vec<LabelWithUsage>, CurationError> {
        Ok(LabelRepo::list_with_usage(&self.pool).await?)
    }

    async fn insert_label(
        &self,
        name: &str,
        description: Option<&str>,
        category_id: Option<DbId>,
        color: &str,
    ) -> Result<Label, CurationError> {
        Ok(LabelRepo::create(&self.pool, name, description, category_id, color).await?)
    }

    async fn update_label(
        &self,
        id: DbId,
        patch: &LabelPatch,
    ) -> Result<Option<Label>, CurationError> {
        let (set_category, category_id) = match patch.category_id {
            Some(category_id) => (true, category_id),
            None => (false, None),
        };
        Ok(LabelRepo::update(
            &self.pool,
            id,
            patch.name.as_deref(),
            patch.description.as_deref(),
            patch.color.as_deref(),
            set_category,
            category_id,
        )
        .await?)
    }

    async fn set_label_active(&self, id: DbId, is_active: bool) -> Result<bool, CurationError> {
        Ok(LabelRepo::set_active(&self.pool, id, is_active).await?)
    }

    async fn delete_label(&self, id: DbId) -> Result<bool, CurationError> {
        Ok(LabelRepo::delete(&self.pool, id).await?)
    }

    async fn count_label_annotations(&self, id: DbId) -> Result<i64, CurationError> {
        Ok(LabelRepo::count_annotations(&self.pool, id).await?)
    }

    async fn merge_labels(
        &self,
        source_ids: &[DbId],
        target_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, CurationError> {
        Ok(LabelRepo::merge(&self.pool, source_ids, target_id, performed_by).await?)
    }

    async fn reassign_label_annotations(
        &self,
        from_id: DbId,
        to_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, CurationError> {
        Ok(LabelRepo::reassign(&self.pool, from_id, to_id, performed_by).await?)
    }

    // --- annotations -------------------------------------------------------

    async fn find_annotation(&self, id: DbId) -> Result<Option<CellAnnotation>, CurationError> {
        Ok(CellAnnotationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_cell_annotations(
        &self,
        text_cell_id: DbId,
    ) -> Result<Vec<CellAnnotation>, CurationError> {
        Ok(CellAnnotationRepo::list_for_cell(&self.pool, text_cell_id).await?)
    }

    async fn insert_annotation(
        &self,
        new: NewCellAnnotation,
    ) -> Result<InsertOutcome, CurationError> {
        match new.status {
            AnnotationStatus::PendingReview => {
                Ok(CellAnnotationRepo::insert_pending(&self.pool, &new).await?)
            }
            _ => {
                let row = CellAnnotationRepo::insert_active(&self.pool, &new).await?;
                Ok(InsertOutcome::Created(row))
            }
        }
    }

    async fn apply_review(
        &self,
        update: ReviewUpdate,
    ) -> Result<Option<CellAnnotation>, CurationError> {
        Ok(CellAnnotationRepo::apply_review(&self.pool, &update).await?)
    }

    async fn replace_with_label(
        &self,
        edit: EditUpdate,
    ) -> Result<Option<EditedAnnotation>, CurationError> {
        Ok(CellAnnotationRepo::replace_with_label(&self.pool, &edit).await?)
    }

    async fn delete_annotation(
        &self,
        id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<Option<CellAnnotation>, CurationError> {
        Ok(CellAnnotationRepo::delete(&self.pool, id, performed_by).await?)
    }

    async fn list_pending(
        &self,
        document_id: Option<DbId>,
    ) -> Result<Vec<CellAnnotation>, CurationError> {
        Ok(CellAnnotationRepo::list_pending(&self.pool, document_id).await?)
    }

    async fn review_counts(
        &self,
        document_id: Option<DbId>,
    ) -> Result<ReviewCounts, CurationError> {
        Ok(CellAnnotationRepo::review_counts(&self.pool, document_id).await?)
    }

    async fn list_cell_actions(
        &self,
        text_cell_id: DbId,
    ) -> Result<Vec<AnnotationAction>, CurationError> {
        Ok(AnnotationActionRepo::list_for_cell(&self.pool, text_cell_id).await?)
    }
}
