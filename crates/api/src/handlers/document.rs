//! Handlers for document-scoped classification and review progress.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use thematic_core::types::DbId;
use thematic_db::{classification, lifecycle};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Query parameters
   -------------------------------------------------------------------------- */

#[derive(Debug, Default, Deserialize)]
pub struct ReclassifyParams {
    /// Also reclassify cells that already carry a classification.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnnotatableParams {
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CellListParams {
    #[serde(default)]
    pub only_unclassified: bool,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// GET /api/v1/documents/{id}/cells
pub async fn list_cells(
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Query(params): Query<CellListParams>,
) -> AppResult<impl IntoResponse> {
    let cells = state
        .store()
        .list_cells(Some(document_id), params.only_unclassified)
        .await?;
    Ok(Json(DataResponse { data: cells }))
}

/// POST /api/v1/documents/{id}/reclassify
///
/// Classify the document's cells and store the results in one batch.
pub async fn reclassify(
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Query(params): Query<ReclassifyParams>,
) -> AppResult<impl IntoResponse> {
    let report = classification::reclassify_document(
        state.store(),
        &state.classifier,
        document_id,
        params.force,
    )
    .await?;

    tracing::info!(
        document_id,
        force = params.force,
        classified = report.classified,
        "Document reclassified",
    );
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/documents/{id}/cells/annotatable
pub async fn annotatable_cells(
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
    Query(params): Query<AnnotatableParams>,
) -> AppResult<impl IntoResponse> {
    let min_confidence = params
        .min_confidence
        .unwrap_or(state.config.min_annotatable_confidence);
    let cells =
        classification::annotatable_cells(state.store(), Some(document_id), Some(min_confidence))
            .await?;
    Ok(Json(DataResponse { data: cells }))
}

/// GET /api/v1/documents/{id}/classification-stats
pub async fn classification_stats(
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let stats = classification::classification_stats(state.store(), Some(document_id)).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/documents/{id}/review-queue
///
/// Pending AI proposals for the document, oldest first.
pub async fn review_queue(
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let pending = lifecycle::review_queue(state.store(), Some(document_id)).await?;
    Ok(Json(DataResponse { data: pending }))
}

/// GET /api/v1/documents/{id}/review-status
pub async fn review_status(
    State(state): State<AppState>,
    Path(document_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let status = lifecycle::review_status(state.store(), Some(document_id)).await?;
    Ok(Json(DataResponse { data: status }))
}
