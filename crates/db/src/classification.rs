//! Classification of stored text cells.
//!
//! The question is the cell's column header and the response is the cell
//! text. Results are written back in one batch so a document is never left
//! half reclassified.

use std::collections::BTreeMap;

use serde::Serialize;
use thematic_core::classifier::QuestionClassifier;
use thematic_core::error::CoreError;
use thematic_core::types::DbId;

use crate::error::CurationError;
use crate::models::text_cell::{CellClassification, ClassificationStats, TextCell};
use crate::store::CurationStore;

/// Cells below this confidence are not surfaced for annotation.
pub const DEFAULT_MIN_ANNOTATABLE_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReclassifyReport {
    pub classified: u64,
    /// Cells left alone because they already had a classification.
    pub skipped: u64,
    pub annotatable: u64,
    pub by_type: BTreeMap<String, u64>,
}

/// Classify one cell. `question_override` replaces the column header.
pub fn classify_cell(
    classifier: &QuestionClassifier,
    cell: &TextCell,
    question_override: Option<&str>,
) -> CellClassification {
    let question = question_override
        .or(cell.column_name.as_deref())
        .unwrap_or("");
    let result = classifier.classify(question, Some(&cell.text_content));
    CellClassification {
        text_cell_id: cell.id,
        question_type: result.question_type,
        confidence: result.confidence,
        is_annotatable: result.should_annotate(),
    }
}

/// Classify `cells` and store the results atomically. Cells that already
/// carry a classification are skipped unless `force`.
pub async fn reclassify_cells(
    store: &dyn CurationStore,
    classifier: &QuestionClassifier,
    cells: &[TextCell],
    force: bool,
) -> Result<ReclassifyReport, CurationError> {
    let mut report = ReclassifyReport::default();
    let mut batch = Vec::with_capacity(cells.len());

    for cell in cells {
        if cell.is_classified() && !force {
            report.skipped += 1;
            continue;
        }
        let result = classify_cell(classifier, cell, None);
        if result.is_annotatable {
            report.annotatable += 1;
        }
        *report
            .by_type
            .entry(result.question_type.as_str().to_string())
            .or_default() += 1;
        batch.push(result);
    }

    if batch.is_empty() {
        return Ok(report);
    }

    report.classified = store.update_cell_classifications(&batch).await?;
    tracing::info!(
        classified = report.classified,
        skipped = report.skipped,
        annotatable = report.annotatable,
        "Cells classified",
    );
    Ok(report)
}

/// Reclassify every cell of a document.
pub async fn reclassify_document(
    store: &dyn CurationStore,
    classifier: &QuestionClassifier,
    document_id: DbId,
    force: bool,
) -> Result<ReclassifyReport, CurationError> {
    let cells = store.list_cells(Some(document_id), false).await?;
    tracing::debug!(document_id, cells = cells.len(), force, "Reclassifying document");
    reclassify_cells(store, classifier, &cells, force).await
}

/// Cells worth annotating: annotatable (or not yet classified) with at least
/// `min_confidence`, which defaults to [`DEFAULT_MIN_ANNOTATABLE_CONFIDENCE`].
pub async fn annotatable_cells(
    store: &dyn CurationStore,
    document_id: Option<DbId>,
    min_confidence: Option<f64>,
) -> Result<Vec<TextCell>, CurationError> {
    let min_confidence = min_confidence.unwrap_or(DEFAULT_MIN_ANNOTATABLE_CONFIDENCE);
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(CoreError::Validation(format!(
            "min_confidence must be between 0 and 1, got {min_confidence}"
        ))
        .into());
    }
    store.list_annotatable_cells(document_id, min_confidence).await
}

pub async fn classification_stats(
    store: &dyn CurationStore,
    document_id: Option<DbId>,
) -> Result<ClassificationStats, CurationError> {
    store.classification_stats(document_id).await
}
