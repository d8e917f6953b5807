//! Cell annotation lifecycle rules.
//!
//! A cell annotation tags one text cell with one label. Human annotations are
//! final as soon as they are written (`active`); AI proposals start in
//! `pending_review` and only count once a reviewer accepts them. This module
//! holds the state machine and the precondition checks; persistence lives in
//! `thematic-db`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Confidence recorded for AI proposals that do not report one.
pub const DEFAULT_AI_CONFIDENCE: f64 = 0.5;

/// Maximum length for free-text notes on an audit action.
pub const MAX_ACTION_NOTES_LENGTH: usize = 2_000;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a cell annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    /// Human-authored, final.
    Active,
    /// AI proposal awaiting a reviewer.
    PendingReview,
    /// AI proposal confirmed by a reviewer. Counts the same as `Active`.
    Accepted,
    /// Kept for audit, excluded from current labels.
    Rejected,
}

const VALID_STATUS_STRINGS: &[&str] = &["active", "pending_review", "accepted", "rejected"];

impl AnnotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingReview => "pending_review",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "pending_review" => Ok(Self::PendingReview),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(CoreError::Validation(format!(
                "Invalid annotation status '{s}'. Must be one of: {}",
                VALID_STATUS_STRINGS.join(", ")
            ))),
        }
    }

    /// Whether annotations in this status count as a current label of the cell.
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Active | Self::Accepted)
    }

    /// No review transition leaves these states.
    pub fn is_terminal(&self) -> bool {
        valid_transitions(*self).is_empty()
    }
}

impl std::fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Review actions and audit action types
// ---------------------------------------------------------------------------

/// A reviewer's decision on a pending AI proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Accept,
    Reject,
    /// Reject the proposal and replace it with a different label.
    Edit,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Edit => "edit",
        }
    }

    /// Audit action recorded for this decision.
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Accept => ActionType::Accept,
            Self::Reject => ActionType::Reject,
            Self::Edit => ActionType::Edit,
        }
    }
}

/// Kind of entry in the append-only annotation audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Accept,
    Reject,
    Edit,
    Delete,
    Merge,
}

const VALID_ACTION_STRINGS: &[&str] = &["create", "accept", "reject", "edit", "delete", "merge"];

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Merge => "merge",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "create" => Ok(Self::Create),
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "merge" => Ok(Self::Merge),
            _ => Err(CoreError::Validation(format!(
                "Invalid action type '{s}'. Must be one of: {}",
                VALID_ACTION_STRINGS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Provenance of an AI proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProvenance {
    pub confidence: f64,
    pub model: Option<String>,
    pub provider: Option<String>,
}

/// Who produced an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationOrigin {
    Human { user_id: DbId },
    Ai(AiProvenance),
}

impl AnnotationOrigin {
    /// Humans skip review; AI proposals always enter it.
    pub fn initial_status(&self) -> AnnotationStatus {
        match self {
            Self::Human { .. } => AnnotationStatus::Active,
            Self::Ai(_) => AnnotationStatus::PendingReview,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Self::Ai(_))
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Statuses reachable from `from` through a review decision.
pub fn valid_transitions(from: AnnotationStatus) -> &'static [AnnotationStatus] {
    match from {
        AnnotationStatus::PendingReview => {
            &[AnnotationStatus::Accepted, AnnotationStatus::Rejected]
        }
        AnnotationStatus::Active | AnnotationStatus::Accepted | AnnotationStatus::Rejected => &[],
    }
}

pub fn can_transition(from: AnnotationStatus, to: AnnotationStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Status the reviewed annotation ends up in. For `Edit` this is the status
/// of the original proposal; the replacement is written separately.
pub fn review_target(
    annotation_id: DbId,
    from: AnnotationStatus,
    action: ReviewAction,
) -> Result<AnnotationStatus, CoreError> {
    let to = match action {
        ReviewAction::Accept => AnnotationStatus::Accepted,
        ReviewAction::Reject | ReviewAction::Edit => AnnotationStatus::Rejected,
    };
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(CoreError::InvalidTransition {
            entity: "CellAnnotation",
            id: annotation_id,
            from: from.as_str().to_string(),
            action: action.as_str().to_string(),
        })
    }
}

/// Deletion is allowed on final and rejected records. Pending proposals have
/// to be rejected first so the decision is recorded.
pub fn validate_deletable(annotation_id: DbId, status: AnnotationStatus) -> Result<(), CoreError> {
    match status {
        AnnotationStatus::PendingReview => Err(CoreError::InvalidTransition {
            entity: "CellAnnotation",
            id: annotation_id,
            from: status.as_str().to_string(),
            action: "delete".to_string(),
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Resolve an optional AI confidence, rejecting values outside `[0, 1]`.
pub fn validate_ai_confidence(confidence: Option<f64>) -> Result<f64, CoreError> {
    let value = confidence.unwrap_or(DEFAULT_AI_CONFIDENCE);
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CoreError::Validation(format!(
            "AI confidence must be between 0 and 1, got {value}"
        )))
    }
}

/// An edit must actually change the label.
pub fn validate_edit_label(current_label_id: DbId, new_label_id: DbId) -> Result<(), CoreError> {
    if current_label_id == new_label_id {
        return Err(CoreError::Validation(format!(
            "Edit must change the label; annotation already uses label {new_label_id}"
        )));
    }
    Ok(())
}

/// Check a label merge request before touching any data.
pub fn validate_merge_request(source_ids: &[DbId], target_id: DbId) -> Result<(), CoreError> {
    if source_ids.is_empty() {
        return Err(CoreError::Validation(
            "At least one source label is required".to_string(),
        ));
    }
    if source_ids.contains(&target_id) {
        return Err(CoreError::Validation(format!(
            "Target label {target_id} cannot also be a merge source"
        )));
    }
    let mut seen = HashSet::with_capacity(source_ids.len());
    if let Some(dup) = source_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(CoreError::Validation(format!(
            "Source label {dup} is listed more than once"
        )));
    }
    Ok(())
}

/// Validate optional notes attached to an audit action.
pub fn validate_action_notes(notes: Option<&str>) -> Result<(), CoreError> {
    match notes {
        Some(n) if n.chars().count() > MAX_ACTION_NOTES_LENGTH => Err(CoreError::Validation(
            format!("Notes must be at most {MAX_ACTION_NOTES_LENGTH} characters"),
        )),
        _ => Ok(()),
    }
}
