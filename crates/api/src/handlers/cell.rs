//! Handlers for a single text cell: lookup, annotations, audit history,
//! and classification with an explicit question.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use thematic_core::types::DbId;
use thematic_db::classification::classify_cell;
use thematic_db::CurationError;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ClassifyCellRequest {
    /// Question text to use instead of the cell's column header.
    #[validate(length(min = 1, max = 5000))]
    pub question: Option<String>,
}

/// GET /api/v1/cells/{id}
pub async fn get_cell(
    State(state): State<AppState>,
    Path(cell_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let cell = state
        .store()
        .find_cell(cell_id)
        .await?
        .ok_or_else(|| CurationError::not_found("TextCell", cell_id))?;
    Ok(Json(DataResponse { data: cell }))
}

/// GET /api/v1/cells/{id}/annotations
pub async fn list_annotations(
    State(state): State<AppState>,
    Path(cell_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let annotations = state.store().list_cell_annotations(cell_id).await?;
    Ok(Json(DataResponse { data: annotations }))
}

/// GET /api/v1/cells/{id}/history
///
/// Audit trail of every lifecycle action on the cell, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Path(cell_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let actions = state.store().list_cell_actions(cell_id).await?;
    Ok(Json(DataResponse { data: actions }))
}

/// POST /api/v1/cells/{id}/classify
///
/// Classify one cell, optionally against a different question, and store
/// the result.
pub async fn classify(
    State(state): State<AppState>,
    Path(cell_id): Path<DbId>,
    Json(input): Json<ClassifyCellRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let cell = state
        .store()
        .find_cell(cell_id)
        .await?
        .ok_or_else(|| CurationError::not_found("TextCell", cell_id))?;

    let result = classify_cell(&state.classifier, &cell, input.question.as_deref());
    state.store().update_cell_classifications(&[result]).await?;

    tracing::info!(
        cell_id,
        question_type = result.question_type.as_str(),
        confidence = result.confidence,
        "Cell classified",
    );
    Ok(Json(DataResponse { data: result }))
}
