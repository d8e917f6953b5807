//! Annotation lifecycle service.
//!
//! Every operation takes the store explicitly. Domain rules come from
//! [`thematic_core::annotation`]; atomicity comes from the store, which
//! applies each state change together with its audit row. Nothing here
//! retries: a failed call leaves the data as it was and the caller decides.

use serde::Serialize;
use thematic_core::annotation::{
    review_target, validate_action_notes, validate_ai_confidence, validate_deletable,
    validate_edit_label, validate_merge_request, AiProvenance, AnnotationOrigin, ReviewAction,
};
use thematic_core::error::CoreError;
use thematic_core::types::DbId;

use crate::error::CurationError;
use crate::models::cell_annotation::{
    CellAnnotation, EditUpdate, EditedAnnotation, InsertOutcome, NewCellAnnotation, ReviewCounts,
    ReviewUpdate,
};
use crate::models::label::Label;
use crate::models::merge::MergeOutcome;
use crate::models::text_cell::TextCell;
use crate::store::CurationStore;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A finished suggestion handed over by the AI collaborator.
#[derive(Debug, Clone, Default)]
pub struct AiSuggestion {
    /// Defaults to [`thematic_core::annotation::DEFAULT_AI_CONFIDENCE`].
    pub confidence: Option<f64>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

/// Result of creating an AI proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(CellAnnotation),
    /// The (cell, label) pair already had a pending proposal; nothing was
    /// written.
    Existing(CellAnnotation),
}

impl CreateOutcome {
    pub fn annotation(&self) -> &CellAnnotation {
        match self {
            Self::Created(a) | Self::Existing(a) => a,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub annotation_id: DbId,
    pub error: String,
}

/// Per-item outcome of a batch review. Items are independent: one failure
/// does not undo the others.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReviewResult {
    pub processed: Vec<DbId>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub target_label_id: DbId,
    pub merged_label_ids: Vec<DbId>,
    /// Annotations now pointing at the target that used to point at a source.
    pub repointed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewStatus {
    #[serde(flatten)]
    pub counts: ReviewCounts,
    pub completion_percent: f64,
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Attach a label to a cell on behalf of a user. Human annotations skip
/// review and start `active`.
pub async fn create_human(
    store: &dyn CurationStore,
    text_cell_id: DbId,
    label_id: DbId,
    user_id: DbId,
) -> Result<CellAnnotation, CurationError> {
    require_cell(store, text_cell_id).await?;
    require_active_label(store, label_id).await?;

    let new = NewCellAnnotation::new(text_cell_id, label_id, AnnotationOrigin::Human { user_id });
    match store.insert_annotation(new).await? {
        InsertOutcome::Created(row) => {
            tracing::info!(
                annotation_id = row.id,
                text_cell_id,
                label_id,
                user_id,
                "Annotation created",
            );
            Ok(row)
        }
        InsertOutcome::DuplicatePending(row) => Err(CoreError::Internal(format!(
            "store reported pending duplicate {} for a human annotation",
            row.id
        ))
        .into()),
    }
}

/// Record an AI proposal in `pending_review`. A proposal for a pair that is
/// already pending returns the existing row instead of failing.
pub async fn create_ai(
    store: &dyn CurationStore,
    text_cell_id: DbId,
    label_id: DbId,
    suggestion: AiSuggestion,
) -> Result<CreateOutcome, CurationError> {
    let confidence = validate_ai_confidence(suggestion.confidence)?;
    require_cell(store, text_cell_id).await?;
    require_active_label(store, label_id).await?;

    let origin = AnnotationOrigin::Ai(AiProvenance {
        confidence,
        model: suggestion.model,
        provider: suggestion.provider,
    });
    let new = NewCellAnnotation::new(text_cell_id, label_id, origin);

    match store.insert_annotation(new).await? {
        InsertOutcome::Created(row) => {
            tracing::info!(
                annotation_id = row.id,
                text_cell_id,
                label_id,
                confidence,
                "AI proposal created",
            );
            Ok(CreateOutcome::Created(row))
        }
        InsertOutcome::DuplicatePending(row) => {
            tracing::debug!(
                annotation_id = row.id,
                text_cell_id,
                label_id,
                "AI proposal already pending",
            );
            Ok(CreateOutcome::Existing(row))
        }
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

pub async fn accept(
    store: &dyn CurationStore,
    annotation_id: DbId,
    reviewer_id: DbId,
    notes: Option<String>,
) -> Result<CellAnnotation, CurationError> {
    review(store, annotation_id, ReviewAction::Accept, reviewer_id, notes).await
}

pub async fn reject(
    store: &dyn CurationStore,
    annotation_id: DbId,
    reviewer_id: DbId,
    notes: Option<String>,
) -> Result<CellAnnotation, CurationError> {
    review(store, annotation_id, ReviewAction::Reject, reviewer_id, notes).await
}

/// Replace a pending proposal's label. The proposal is rejected and an
/// `active` annotation with the new label is written for the reviewer,
/// keeping the proposal's AI provenance.
pub async fn edit(
    store: &dyn CurationStore,
    annotation_id: DbId,
    reviewer_id: DbId,
    new_label_id: DbId,
    notes: Option<String>,
) -> Result<EditedAnnotation, CurationError> {
    validate_action_notes(notes.as_deref())?;
    let current = require_annotation(store, annotation_id).await?;
    review_target(annotation_id, current.lifecycle_status()?, ReviewAction::Edit)?;
    validate_edit_label(current.label_id, new_label_id)?;
    require_active_label(store, new_label_id).await?;

    let update = EditUpdate {
        annotation_id,
        reviewer_id,
        new_label_id,
        notes,
    };
    match store.replace_with_label(update).await? {
        Some(edited) => {
            tracing::info!(
                annotation_id,
                replacement_id = edited.replacement.id,
                reviewer_id,
                old_label_id = current.label_id,
                new_label_id,
                "AI proposal edited",
            );
            Ok(edited)
        }
        None => Err(lost_race(store, annotation_id, ReviewAction::Edit).await),
    }
}

/// Accept or reject many proposals. Each item is reviewed on its own.
pub async fn review_batch(
    store: &dyn CurationStore,
    annotation_ids: &[DbId],
    action: ReviewAction,
    reviewer_id: DbId,
) -> Result<BatchReviewResult, CurationError> {
    if action == ReviewAction::Edit {
        return Err(CoreError::Validation(
            "Batch review supports accept and reject only".to_string(),
        )
        .into());
    }

    let mut result = BatchReviewResult::default();
    for &annotation_id in annotation_ids {
        match review(store, annotation_id, action, reviewer_id, None).await {
            Ok(_) => result.processed.push(annotation_id),
            Err(e) => result.failed.push(BatchFailure {
                annotation_id,
                error: e.to_string(),
            }),
        }
    }

    tracing::info!(
        reviewer_id,
        action = action.as_str(),
        processed = result.processed.len(),
        failed = result.failed.len(),
        "Batch review finished",
    );
    Ok(result)
}

async fn review(
    store: &dyn CurationStore,
    annotation_id: DbId,
    action: ReviewAction,
    reviewer_id: DbId,
    notes: Option<String>,
) -> Result<CellAnnotation, CurationError> {
    validate_action_notes(notes.as_deref())?;
    let current = require_annotation(store, annotation_id).await?;
    let from = current.lifecycle_status()?;
    let to = review_target(annotation_id, from, action)?;

    let update = ReviewUpdate {
        annotation_id,
        expected_status: from,
        new_status: to,
        reviewer_id,
        action: action.action_type(),
        notes,
    };
    match store.apply_review(update).await? {
        Some(row) => {
            tracing::info!(
                annotation_id,
                reviewer_id,
                from = from.as_str(),
                to = to.as_str(),
                "Annotation reviewed",
            );
            Ok(row)
        }
        None => Err(lost_race(store, annotation_id, action).await),
    }
}

/// Error for a conditional update that matched nothing: the row was deleted
/// or reviewed by someone else in the meantime.
async fn lost_race(store: &dyn CurationStore, annotation_id: DbId, action: ReviewAction) -> CurationError {
    match store.find_annotation(annotation_id).await {
        Ok(Some(row)) => CoreError::InvalidTransition {
            entity: "CellAnnotation",
            id: annotation_id,
            from: row.status,
            action: action.as_str().to_string(),
        }
        .into(),
        Ok(None) => CurationError::not_found("CellAnnotation", annotation_id),
        Err(e) => e,
    }
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Remove an annotation. Pending proposals must be rejected first.
pub async fn delete(
    store: &dyn CurationStore,
    annotation_id: DbId,
    performed_by: Option<DbId>,
) -> Result<CellAnnotation, CurationError> {
    let current = require_annotation(store, annotation_id).await?;
    validate_deletable(annotation_id, current.lifecycle_status()?)?;

    let deleted = store
        .delete_annotation(annotation_id, performed_by)
        .await?
        .ok_or_else(|| CurationError::not_found("CellAnnotation", annotation_id))?;

    tracing::info!(annotation_id, ?performed_by, "Annotation deleted");
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Label consolidation
// ---------------------------------------------------------------------------

/// Merge `source_ids` into `target_id`: every annotation moves to the
/// target and the source labels are deleted, all or nothing.
pub async fn merge(
    store: &dyn CurationStore,
    source_ids: &[DbId],
    target_id: DbId,
    performed_by: Option<DbId>,
) -> Result<MergeReport, CurationError> {
    validate_merge_request(source_ids, target_id)?;

    match store.merge_labels(source_ids, target_id, performed_by).await? {
        MergeOutcome::Merged(repointed) => {
            tracing::info!(?source_ids, target_id, repointed, "Labels merged");
            Ok(MergeReport {
                target_label_id: target_id,
                merged_label_ids: source_ids.to_vec(),
                repointed,
            })
        }
        MergeOutcome::Missing(id) => {
            tracing::warn!(?source_ids, target_id, missing = id, "Label merge aborted");
            Err(CurationError::not_found("Label", id))
        }
        MergeOutcome::Colliding(cell_ids) => {
            tracing::warn!(?source_ids, target_id, ?cell_ids, "Label merge aborted");
            Err(colliding_cells_error(target_id, &cell_ids))
        }
    }
}

/// Move every annotation of `from_id` onto `to_id`, keeping `from_id`.
pub async fn reassign(
    store: &dyn CurationStore,
    from_id: DbId,
    to_id: DbId,
    performed_by: Option<DbId>,
) -> Result<u64, CurationError> {
    if from_id == to_id {
        return Err(CoreError::Validation(format!(
            "Cannot reassign label {from_id} to itself"
        ))
        .into());
    }

    match store
        .reassign_label_annotations(from_id, to_id, performed_by)
        .await?
    {
        MergeOutcome::Merged(moved) => {
            tracing::info!(from_id, to_id, moved, "Label annotations reassigned");
            Ok(moved)
        }
        MergeOutcome::Missing(id) => Err(CurationError::not_found("Label", id)),
        MergeOutcome::Colliding(cell_ids) => Err(colliding_cells_error(to_id, &cell_ids)),
    }
}

/// Moving the rows would put two pending proposals, or two annotations by
/// one author, under the same label on these cells. Reject or delete one of
/// each pair first.
fn colliding_cells_error(target_id: DbId, cell_ids: &[DbId]) -> CurationError {
    CoreError::Conflict(format!(
        "Label {target_id} already has a matching annotation on cells {cell_ids:?}"
    ))
    .into()
}

/// Hard-delete a label that no annotation uses. Used labels leave through
/// [`merge`] or [`reassign`].
pub async fn delete_label(store: &dyn CurationStore, label_id: DbId) -> Result<(), CurationError> {
    store
        .find_label(label_id)
        .await?
        .ok_or_else(|| CurationError::not_found("Label", label_id))?;

    let used = store.count_label_annotations(label_id).await?;
    if used > 0 {
        return Err(CoreError::Conflict(format!(
            "Label {label_id} is used by {used} annotation(s); merge or reassign it first"
        ))
        .into());
    }

    if !store.delete_label(label_id).await? {
        return Err(CurationError::not_found("Label", label_id));
    }
    tracing::info!(label_id, "Label deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Pending AI proposals, oldest first.
pub async fn review_queue(
    store: &dyn CurationStore,
    document_id: Option<DbId>,
) -> Result<Vec<CellAnnotation>, CurationError> {
    store.list_pending(document_id).await
}

pub async fn review_status(
    store: &dyn CurationStore,
    document_id: Option<DbId>,
) -> Result<ReviewStatus, CurationError> {
    let counts = store.review_counts(document_id).await?;
    Ok(ReviewStatus {
        completion_percent: counts.completion_percent(),
        counts,
    })
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

async fn require_cell(store: &dyn CurationStore, id: DbId) -> Result<TextCell, CurationError> {
    store
        .find_cell(id)
        .await?
        .ok_or_else(|| CurationError::not_found("TextCell", id))
}

async fn require_annotation(
    store: &dyn CurationStore,
    id: DbId,
) -> Result<CellAnnotation, CurationError> {
    store
        .find_annotation(id)
        .await?
        .ok_or_else(|| CurationError::not_found("CellAnnotation", id))
}

async fn require_active_label(store: &dyn CurationStore, id: DbId) -> Result<Label, CurationError> {
    let label = store
        .find_label(id)
        .await?
        .ok_or_else(|| CurationError::not_found("Label", id))?;
    if !label.is_active {
        return Err(CoreError::Validation(format!("Label '{}' is inactive", label.name)).into());
    }
    Ok(label)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use thematic_core::annotation::AnnotationStatus;

    use super::*;
    use crate::memory_store::{FaultPoint, MemoryStore};
    use crate::models::text_cell::CreateTextCell;

    const REVIEWER: DbId = 900;
    const AUTHOR: DbId = 901;

    async fn seed_cell(store: &MemoryStore, row: i32) -> DbId {
        store
            .insert_cell(CreateTextCell {
                document_id: 1,
                sheet_name: Some("Risposte".to_string()),
                row_index: row,
                column_index: 0,
                column_name: Some("Come utilizzi l'IA nel tuo lavoro?".to_string()),
                text_content: format!("risposta {row}"),
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_label(store: &MemoryStore, name: &str) -> DbId {
        store
            .insert_label(name, None, None, "#6c757d")
            .await
            .unwrap()
            .id
    }

    async fn propose(store: &MemoryStore, cell: DbId, label: DbId) -> CellAnnotation {
        let suggestion = AiSuggestion {
            confidence: Some(0.82),
            model: Some("gpt-4o".to_string()),
            provider: Some("openai".to_string()),
        };
        create_ai(store, cell, label, suggestion)
            .await
            .unwrap()
            .annotation()
            .clone()
    }

    async fn total_annotations(store: &MemoryStore, cells: &[DbId]) -> usize {
        let mut total = 0;
        for cell in cells {
            total += store.list_cell_annotations(*cell).await.unwrap().len();
        }
        total
    }

    // -- creation -------------------------------------------------------------

    #[tokio::test]
    async fn human_annotation_starts_active() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;

        let row = create_human(&store, cell, label, AUTHOR).await.unwrap();
        assert_eq!(row.status, "active");
        assert!(!row.is_ai_generated);
        assert_eq!(row.created_by, Some(AUTHOR));

        let actions = store.list_cell_actions(cell).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, "create");
        assert_eq!(actions[0].to_status.as_deref(), Some("active"));
    }

    #[tokio::test]
    async fn ai_annotation_starts_pending_with_provenance() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;

        let row = propose(&store, cell, label).await;
        assert_eq!(row.status, "pending_review");
        assert!(row.is_ai_generated);
        assert_eq!(row.ai_confidence, Some(0.82));
        assert_eq!(row.ai_model.as_deref(), Some("gpt-4o"));
        assert_eq!(row.created_by, None);
    }

    #[tokio::test]
    async fn duplicate_pending_proposal_returns_existing() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;

        let first = create_ai(&store, cell, label, AiSuggestion::default())
            .await
            .unwrap();
        let second = create_ai(&store, cell, label, AiSuggestion::default())
            .await
            .unwrap();

        assert!(first.is_created());
        assert_matches!(&second, CreateOutcome::Existing(row) if row.id == first.annotation().id);
        assert_eq!(store.list_pending(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_proposals_leave_one_pending_row() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;

        let (a, b) = tokio::join!(
            create_ai(&store, cell, label, AiSuggestion::default()),
            create_ai(&store, cell, label, AiSuggestion::default()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.annotation().id, b.annotation().id);
        assert_eq!(
            [a.is_created(), b.is_created()].iter().filter(|c| **c).count(),
            1
        );
        assert_eq!(store.list_pending(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_missing_references_and_bad_confidence() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;

        let err = create_human(&store, 4242, label, AUTHOR).await.unwrap_err();
        assert_matches!(
            err,
            CurationError::Core(CoreError::NotFound { entity: "TextCell", id: 4242 })
        );

        let err = create_human(&store, cell, 4343, AUTHOR).await.unwrap_err();
        assert_matches!(
            err,
            CurationError::Core(CoreError::NotFound { entity: "Label", id: 4343 })
        );

        let suggestion = AiSuggestion {
            confidence: Some(1.2),
            ..Default::default()
        };
        let err = create_ai(&store, cell, label, suggestion).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn inactive_label_cannot_be_attached() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Obsoleta").await;
        store.set_label_active(label, false).await.unwrap();

        let err = create_human(&store, cell, label, AUTHOR).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn same_user_cannot_attach_label_twice() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;

        create_human(&store, cell, label, AUTHOR).await.unwrap();
        let err = create_human(&store, cell, label, AUTHOR).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));

        // A different user may attach the same label.
        create_human(&store, cell, label, REVIEWER).await.unwrap();
    }

    #[tokio::test]
    async fn edit_onto_reviewers_own_label_conflicts_and_keeps_proposal() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let proposed = seed_label(&store, "Fiducia").await;
        let own = seed_label(&store, "Paura").await;
        create_human(&store, cell, own, REVIEWER).await.unwrap();
        let proposal = propose(&store, cell, proposed).await;

        let err = edit(&store, proposal.id, REVIEWER, own, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));

        let row = store.find_annotation(proposal.id).await.unwrap().unwrap();
        assert_eq!(row.status, "pending_review");
    }

    // -- review ---------------------------------------------------------------

    #[tokio::test]
    async fn accept_moves_pending_to_accepted_with_audit() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;
        let proposal = propose(&store, cell, label).await;

        let row = accept(&store, proposal.id, REVIEWER, Some("ok".to_string()))
            .await
            .unwrap();
        assert_eq!(row.status, "accepted");
        assert_eq!(row.reviewed_by, Some(REVIEWER));
        assert!(row.reviewed_at.is_some());

        let actions = store.list_cell_actions(cell).await.unwrap();
        let last = actions.last().unwrap();
        assert_eq!(last.action_type, "accept");
        assert_eq!(last.from_status.as_deref(), Some("pending_review"));
        assert_eq!(last.to_status.as_deref(), Some("accepted"));
        assert_eq!(last.notes.as_deref(), Some("ok"));
        assert!(last.was_ai_generated);
    }

    #[tokio::test]
    async fn reviewing_a_decided_annotation_is_an_invalid_transition() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;
        let proposal = propose(&store, cell, label).await;

        reject(&store, proposal.id, REVIEWER, None).await.unwrap();
        let before = store.list_cell_actions(cell).await.unwrap().len();

        let err = accept(&store, proposal.id, REVIEWER, None).await.unwrap_err();
        assert_matches!(
            err,
            CurationError::Core(CoreError::InvalidTransition { ref from, .. }) if from == "rejected"
        );
        let row = store.find_annotation(proposal.id).await.unwrap().unwrap();
        assert_eq!(row.status, "rejected");
        assert_eq!(store.list_cell_actions(cell).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn human_annotation_cannot_be_reviewed() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;
        let row = create_human(&store, cell, label, AUTHOR).await.unwrap();

        let err = accept(&store, row.id, REVIEWER, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn review_of_missing_annotation_is_not_found() {
        let store = MemoryStore::new();
        let err = reject(&store, 77, REVIEWER, None).await.unwrap_err();
        assert_matches!(
            err,
            CurationError::Core(CoreError::NotFound { entity: "CellAnnotation", id: 77 })
        );
    }

    #[tokio::test]
    async fn edit_rejects_proposal_and_creates_reviewer_annotation() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let old_label = seed_label(&store, "Fiducia").await;
        let new_label = seed_label(&store, "Paura").await;
        let proposal = propose(&store, cell, old_label).await;

        let edited = edit(&store, proposal.id, REVIEWER, new_label, None)
            .await
            .unwrap();

        assert_eq!(edited.original.status, "rejected");
        assert_eq!(edited.replacement.status, "active");
        assert_eq!(edited.replacement.label_id, new_label);
        assert_eq!(edited.replacement.created_by, Some(REVIEWER));
        assert!(!edited.replacement.is_ai_generated);
        assert_eq!(edited.replacement.ai_model.as_deref(), Some("gpt-4o"));

        let edits: Vec<_> = store
            .list_cell_actions(cell)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.action_type == "edit")
            .collect();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].label_id, Some(new_label));
    }

    #[tokio::test]
    async fn edit_requires_a_different_existing_label() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;
        let proposal = propose(&store, cell, label).await;

        let err = edit(&store, proposal.id, REVIEWER, label, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Validation(_)));

        let err = edit(&store, proposal.id, REVIEWER, 5555, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::NotFound { entity: "Label", .. }));

        let row = store.find_annotation(proposal.id).await.unwrap().unwrap();
        assert_eq!(row.status, "pending_review");
    }

    #[tokio::test]
    async fn batch_review_reports_each_item() {
        let store = MemoryStore::new();
        let label = seed_label(&store, "Fiducia").await;
        let first = propose(&store, seed_cell(&store, 1).await, label).await;
        let second = propose(&store, seed_cell(&store, 2).await, label).await;
        reject(&store, second.id, REVIEWER, None).await.unwrap();

        let result = review_batch(
            &store,
            &[first.id, second.id, 999],
            ReviewAction::Accept,
            REVIEWER,
        )
        .await
        .unwrap();

        assert_eq!(result.processed, vec![first.id]);
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.failed[0].annotation_id, second.id);
        assert_eq!(result.failed[1].annotation_id, 999);
    }

    #[tokio::test]
    async fn batch_review_refuses_edit() {
        let store = MemoryStore::new();
        let err = review_batch(&store, &[1], ReviewAction::Edit, REVIEWER)
            .await
            .unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Validation(_)));
    }

    // -- deletion -------------------------------------------------------------

    #[tokio::test]
    async fn pending_proposal_must_be_rejected_before_delete() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;
        let proposal = propose(&store, cell, label).await;

        let err = delete(&store, proposal.id, Some(REVIEWER)).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::InvalidTransition { .. }));

        reject(&store, proposal.id, REVIEWER, None).await.unwrap();
        let deleted = delete(&store, proposal.id, Some(REVIEWER)).await.unwrap();
        assert_eq!(deleted.id, proposal.id);
        assert!(store.find_annotation(proposal.id).await.unwrap().is_none());

        let actions = store.list_cell_actions(cell).await.unwrap();
        assert_eq!(actions.last().unwrap().action_type, "delete");
    }

    // -- merge ----------------------------------------------------------------

    /// Labels A, B, C with `k` annotations each on distinct cells.
    async fn seed_merge_fixture(store: &MemoryStore, k: i32) -> ([DbId; 3], Vec<DbId>) {
        let labels = [
            seed_label(store, "A").await,
            seed_label(store, "B").await,
            seed_label(store, "C").await,
        ];
        let mut cells = Vec::new();
        for (i, label) in labels.iter().enumerate() {
            for j in 0..k {
                let cell = seed_cell(store, i as i32 * 100 + j).await;
                cells.push(cell);
                if j % 2 == 0 {
                    create_human(store, cell, *label, AUTHOR).await.unwrap();
                } else {
                    propose(store, cell, *label).await;
                }
            }
        }
        (labels, cells)
    }

    #[tokio::test]
    async fn merge_moves_every_annotation_to_target() {
        let store = MemoryStore::new();
        let ([a, b, c], cells) = seed_merge_fixture(&store, 3).await;
        let before = total_annotations(&store, &cells).await;

        let report = merge(&store, &[a, b], c, Some(REVIEWER)).await.unwrap();

        assert_eq!(report.repointed, 6);
        assert_eq!(report.merged_label_ids, vec![a, b]);
        assert_eq!(store.count_label_annotations(c).await.unwrap(), 9);
        assert!(store.find_label(a).await.unwrap().is_none());
        assert!(store.find_label(b).await.unwrap().is_none());
        assert_eq!(total_annotations(&store, &cells).await, before);

        // Pending proposals stay pending under the new label.
        let pending = store.list_pending(None).await.unwrap();
        assert!(pending.iter().all(|p| p.label_id == c));
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn merge_fault_leaves_pre_state() {
        let store = MemoryStore::new();
        let ([a, b, c], cells) = seed_merge_fixture(&store, 2).await;
        let before_counts = [
            store.count_label_annotations(a).await.unwrap(),
            store.count_label_annotations(b).await.unwrap(),
            store.count_label_annotations(c).await.unwrap(),
        ];
        let before_actions = store.list_cell_actions(cells[0]).await.unwrap().len();

        store.inject_fault(FaultPoint::AfterRepoint).await;
        let err = merge(&store, &[a, b], c, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Internal(_)));

        let after_counts = [
            store.count_label_annotations(a).await.unwrap(),
            store.count_label_annotations(b).await.unwrap(),
            store.count_label_annotations(c).await.unwrap(),
        ];
        assert_eq!(after_counts, before_counts);
        assert!(store.find_label(a).await.unwrap().is_some());
        assert!(store.find_label(b).await.unwrap().is_some());
        assert_eq!(store.list_cell_actions(cells[0]).await.unwrap().len(), before_actions);
    }

    #[tokio::test]
    async fn merge_with_missing_label_changes_nothing() {
        let store = MemoryStore::new();
        let ([a, _, c], _) = seed_merge_fixture(&store, 1).await;

        let err = merge(&store, &[a, 31337], c, None).await.unwrap_err();
        assert_matches!(
            err,
            CurationError::Core(CoreError::NotFound { entity: "Label", id: 31337 })
        );
        assert_eq!(store.count_label_annotations(a).await.unwrap(), 1);
        assert!(store.find_label(a).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn self_merge_is_rejected_before_mutation() {
        let store = MemoryStore::new();
        let ([a, _, c], _) = seed_merge_fixture(&store, 1).await;

        let err = merge(&store, &[a, c], c, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Validation(_)));
        assert!(store.find_label(a).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn merge_writes_merge_audit_rows() {
        let store = MemoryStore::new();
        let ([a, _, c], cells) = seed_merge_fixture(&store, 1).await;

        merge(&store, &[a], c, Some(REVIEWER)).await.unwrap();

        let actions = store.list_cell_actions(cells[0]).await.unwrap();
        let last = actions.last().unwrap();
        assert_eq!(last.action_type, "merge");
        assert_eq!(last.label_id, Some(c));
        assert_eq!(last.performed_by, Some(REVIEWER));
        assert_eq!(last.target_user_id, Some(AUTHOR));
    }

    #[tokio::test]
    async fn merge_refuses_colliding_pending_proposals() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let a = seed_label(&store, "A").await;
        let c = seed_label(&store, "C").await;
        let from_a = propose(&store, cell, a).await;
        let on_c = propose(&store, cell, c).await;
        let before_actions = store.list_cell_actions(cell).await.unwrap().len();

        let err = merge(&store, &[a], c, None).await.unwrap_err();
        assert_matches!(
            err,
            CurationError::Core(CoreError::Conflict(msg)) if msg.contains(&cell.to_string())
        );

        assert!(store.find_label(a).await.unwrap().is_some());
        assert_eq!(store.find_annotation(from_a.id).await.unwrap().unwrap().label_id, a);
        assert_eq!(store.find_annotation(on_c.id).await.unwrap().unwrap().label_id, c);
        assert_eq!(store.list_pending(None).await.unwrap().len(), 2);
        assert_eq!(store.list_cell_actions(cell).await.unwrap().len(), before_actions);
    }

    #[tokio::test]
    async fn merge_refuses_same_author_on_same_cell() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let a = seed_label(&store, "A").await;
        let b = seed_label(&store, "B").await;
        let c = seed_label(&store, "C").await;
        create_human(&store, cell, a, AUTHOR).await.unwrap();
        create_human(&store, cell, b, AUTHOR).await.unwrap();

        // A and B collide with each other even though C is unused.
        let err = merge(&store, &[a, b], c, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));
        assert_eq!(store.count_label_annotations(a).await.unwrap(), 1);
        assert_eq!(store.count_label_annotations(b).await.unwrap(), 1);
        assert_eq!(store.count_label_annotations(c).await.unwrap(), 0);

        let err = reassign(&store, a, b, None).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));
        assert_eq!(store.count_label_annotations(a).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn merge_keeps_annotations_by_different_authors_on_same_cell() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let a = seed_label(&store, "A").await;
        let c = seed_label(&store, "C").await;
        create_human(&store, cell, a, AUTHOR).await.unwrap();
        create_human(&store, cell, c, REVIEWER).await.unwrap();
        let ai_on_a = propose(&store, cell, a).await;
        accept(&store, ai_on_a.id, REVIEWER, None).await.unwrap();

        let report = merge(&store, &[a], c, None).await.unwrap();
        assert_eq!(report.repointed, 2);
        assert_eq!(store.count_label_annotations(c).await.unwrap(), 3);
    }

    // -- label deletion and reassignment ---------------------------------------

    #[tokio::test]
    async fn used_label_cannot_be_deleted() {
        let store = MemoryStore::new();
        let cell = seed_cell(&store, 1).await;
        let label = seed_label(&store, "Fiducia").await;
        create_human(&store, cell, label, AUTHOR).await.unwrap();

        let err = delete_label(&store, label).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));
        assert!(store.find_label(label).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unused_label_is_deleted() {
        let store = MemoryStore::new();
        let label = seed_label(&store, "Fiducia").await;

        delete_label(&store, label).await.unwrap();
        assert!(store.find_label(label).await.unwrap().is_none());

        let err = delete_label(&store, label).await.unwrap_err();
        assert_matches!(err, CurationError::Core(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reassign_keeps_the_source_label() {
        let store = MemoryStore::new();
        let ([a, _, c], _) = seed_merge_fixture(&store, 2).await;

        let moved = reassign(&store, a, c, None).await.unwrap();
        assert_eq!(moved, 2);
        assert_eq!(store.count_label_annotations(a).await.unwrap(), 0);
        assert_eq!(store.count_label_annotations(c).await.unwrap(), 4);

        // Now unused, so it can be deleted.
        delete_label(&store, a).await.unwrap();
    }

    // -- queries --------------------------------------------------------------

    #[tokio::test]
    async fn review_status_counts_ai_outcomes() {
        let store = MemoryStore::new();
        let label = seed_label(&store, "Fiducia").await;
        let cells = [
            seed_cell(&store, 1).await,
            seed_cell(&store, 2).await,
            seed_cell(&store, 3).await,
            seed_cell(&store, 4).await,
        ];
        let p1 = propose(&store, cells[0], label).await;
        let p2 = propose(&store, cells[1], label).await;
        propose(&store, cells[2], label).await;
        create_human(&store, cells[3], label, AUTHOR).await.unwrap();
        accept(&store, p1.id, REVIEWER, None).await.unwrap();
        reject(&store, p2.id, REVIEWER, None).await.unwrap();

        let status = review_status(&store, Some(1)).await.unwrap();
        assert_eq!(status.counts.pending, 1);
        assert_eq!(status.counts.accepted, 1);
        assert_eq!(status.counts.rejected, 1);
        assert_eq!(status.counts.total, 3);
        assert_eq!(status.counts.annotated_cells, 2);
        assert!((status.completion_percent - 200.0 / 3.0).abs() < 1e-9);

        let queue = review_queue(&store, Some(1)).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert!(review_queue(&store, Some(2)).await.unwrap().is_empty());
    }
}
