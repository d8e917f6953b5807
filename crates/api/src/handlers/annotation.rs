//! Handlers for the annotation lifecycle: creation, review, and deletion.
//!
//! Reviewer and actor ids travel in the request body. Every state change is
//! delegated to [`thematic_db::lifecycle`], which enforces the transition
//! rules and writes the audit trail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use thematic_core::annotation::ReviewAction;
use thematic_core::types::DbId;
use thematic_db::lifecycle::{self, AiSuggestion, CreateOutcome};
use thematic_db::models::cell_annotation::{CreateAiAnnotation, CreateHumanAnnotation};
use thematic_db::CurationError;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    pub reviewer_id: DbId,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditRequest {
    pub reviewer_id: DbId,
    pub new_label_id: DbId,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchReviewRequest {
    #[validate(length(min = 1, max = 500))]
    pub annotation_ids: Vec<DbId>,
    /// `accept` or `reject`.
    pub action: ReviewAction,
    pub reviewer_id: DbId,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pub performed_by: Option<DbId>,
}

/* --------------------------------------------------------------------------
   Creation
   -------------------------------------------------------------------------- */

/// POST /api/v1/annotations
///
/// Attach a label to a cell on behalf of a user. Starts `active`.
pub async fn create_human(
    State(state): State<AppState>,
    Json(input): Json<CreateHumanAnnotation>,
) -> AppResult<impl IntoResponse> {
    let annotation =
        lifecycle::create_human(state.store(), input.text_cell_id, input.label_id, input.user_id)
            .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}

/// POST /api/v1/annotations/ai
///
/// Record an AI proposal in `pending_review`. Returns 201 for a new
/// proposal and 200 with the existing row when the pair is already pending.
pub async fn create_ai(
    State(state): State<AppState>,
    Json(input): Json<CreateAiAnnotation>,
) -> AppResult<impl IntoResponse> {
    let suggestion = AiSuggestion {
        confidence: input.confidence,
        model: input.model,
        provider: input.provider,
    };
    let outcome =
        lifecycle::create_ai(state.store(), input.text_cell_id, input.label_id, suggestion).await?;

    let status = match outcome {
        CreateOutcome::Created(_) => StatusCode::CREATED,
        CreateOutcome::Existing(_) => StatusCode::OK,
    };
    let annotation = match outcome {
        CreateOutcome::Created(a) | CreateOutcome::Existing(a) => a,
    };
    Ok((status, Json(DataResponse { data: annotation })))
}

/// GET /api/v1/annotations/{id}
pub async fn get_annotation(
    State(state): State<AppState>,
    Path(annotation_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let annotation = state
        .store()
        .find_annotation(annotation_id)
        .await?
        .ok_or_else(|| CurationError::not_found("CellAnnotation", annotation_id))?;
    Ok(Json(DataResponse { data: annotation }))
}

/* --------------------------------------------------------------------------
   Review
   -------------------------------------------------------------------------- */

/// POST /api/v1/annotations/{id}/accept
pub async fn accept(
    State(state): State<AppState>,
    Path(annotation_id): Path<DbId>,
    Json(input): Json<ReviewRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let annotation =
        lifecycle::accept(state.store(), annotation_id, input.reviewer_id, input.notes).await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// POST /api/v1/annotations/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(annotation_id): Path<DbId>,
    Json(input): Json<ReviewRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let annotation =
        lifecycle::reject(state.store(), annotation_id, input.reviewer_id, input.notes).await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// POST /api/v1/annotations/{id}/edit
///
/// Reject the proposal and replace it with `new_label_id`. Returns both the
/// rejected original and the active replacement.
pub async fn edit(
    State(state): State<AppState>,
    Path(annotation_id): Path<DbId>,
    Json(input): Json<EditRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let edited = lifecycle::edit(
        state.store(),
        annotation_id,
        input.reviewer_id,
        input.new_label_id,
        input.notes,
    )
    .await?;
    Ok(Json(DataResponse { data: edited }))
}

/// POST /api/v1/annotations/review-batch
///
/// Items are reviewed independently; failures are reported per id.
pub async fn review_batch(
    State(state): State<AppState>,
    Json(input): Json<BatchReviewRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let result = lifecycle::review_batch(
        state.store(),
        &input.annotation_ids,
        input.action,
        input.reviewer_id,
    )
    .await?;
    Ok(Json(DataResponse { data: result }))
}

/* --------------------------------------------------------------------------
   Deletion
   -------------------------------------------------------------------------- */

/// DELETE /api/v1/annotations/{id}
///
/// Pending proposals must be rejected first.
pub async fn delete(
    State(state): State<AppState>,
    Path(annotation_id): Path<DbId>,
    Query(params): Query<DeleteParams>,
) -> AppResult<impl IntoResponse> {
    lifecycle::delete(state.store(), annotation_id, params.performed_by).await?;
    Ok(StatusCode::NO_CONTENT)
}
