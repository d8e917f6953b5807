//! Handlers for label maintenance and consolidation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thematic_core::types::DbId;
use thematic_db::models::label::{CreateLabel, LabelWithUsage, UpdateLabel};
use thematic_db::{lifecycle, taxonomy, CurationError};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request and response bodies
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize, Validate)]
pub struct MergeLabelsRequest {
    #[validate(length(min = 1, max = 100))]
    pub source_ids: Vec<DbId>,
    pub target_id: DbId,
    pub performed_by: Option<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub to_label_id: DbId,
    pub performed_by: Option<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub from_label_id: DbId,
    pub to_label_id: DbId,
    pub reassigned: u64,
}

/// A label as listed, with the colour it is displayed in.
#[derive(Debug, Serialize)]
pub struct LabelListItem {
    #[serde(flatten)]
    pub label: LabelWithUsage,
    pub effective_color: String,
    pub has_custom_color: bool,
}

impl From<LabelWithUsage> for LabelListItem {
    fn from(label: LabelWithUsage) -> Self {
        Self {
            effective_color: label.effective_color().to_string(),
            has_custom_color: label.has_custom_color(),
            label,
        }
    }
}

/* --------------------------------------------------------------------------
   CRUD
   -------------------------------------------------------------------------- */

/// GET /api/v1/labels
///
/// Every label with its category and usage count.
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let labels: Vec<LabelListItem> = taxonomy::list_labels(state.store())
        .await?
        .into_iter()
        .map(LabelListItem::from)
        .collect();
    Ok(Json(DataResponse { data: labels }))
}

/// GET /api/v1/labels/{id}
pub async fn get_label(
    State(state): State<AppState>,
    Path(label_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let label = state
        .store()
        .find_label(label_id)
        .await?
        .ok_or_else(|| CurationError::not_found("Label", label_id))?;
    Ok(Json(DataResponse { data: label }))
}

/// POST /api/v1/labels
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateLabel>,
) -> AppResult<impl IntoResponse> {
    let label = taxonomy::create_label(state.store(), &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: label })))
}

/// PUT /api/v1/labels/{id}
///
/// `"category_id": null` moves the label out of its category; omitting the
/// field leaves it unchanged.
pub async fn update(
    State(state): State<AppState>,
    Path(label_id): Path<DbId>,
    Json(input): Json<UpdateLabel>,
) -> AppResult<impl IntoResponse> {
    let label = taxonomy::update_label(state.store(), label_id, &input).await?;
    Ok(Json(DataResponse { data: label }))
}

/// PUT /api/v1/labels/{id}/active
///
/// Soft-delete or restore a label. Inactive labels keep their annotations
/// but cannot be used for new ones.
pub async fn set_active(
    State(state): State<AppState>,
    Path(label_id): Path<DbId>,
    Json(input): Json<SetActiveRequest>,
) -> AppResult<impl IntoResponse> {
    taxonomy::set_label_active(state.store(), label_id, input.is_active).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/labels/{id}
///
/// Fails with 409 while any annotation still uses the label.
pub async fn delete(
    State(state): State<AppState>,
    Path(label_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    lifecycle::delete_label(state.store(), label_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/* --------------------------------------------------------------------------
   Consolidation
   -------------------------------------------------------------------------- */

/// POST /api/v1/labels/merge
pub async fn merge(
    State(state): State<AppState>,
    Json(input): Json<MergeLabelsRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let report = lifecycle::merge(
        state.store(),
        &input.source_ids,
        input.target_id,
        input.performed_by,
    )
    .await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/labels/merge-suggestions
pub async fn merge_suggestions(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let suggestions = taxonomy::merge_suggestions(state.store()).await?;
    Ok(Json(DataResponse { data: suggestions }))
}

/// POST /api/v1/labels/{id}/reassign
///
/// Move every annotation of the label onto another one without deleting it.
pub async fn reassign(
    State(state): State<AppState>,
    Path(label_id): Path<DbId>,
    Json(input): Json<ReassignRequest>,
) -> AppResult<impl IntoResponse> {
    let reassigned =
        lifecycle::reassign(state.store(), label_id, input.to_label_id, input.performed_by)
            .await?;
    Ok(Json(DataResponse {
        data: ReassignResponse {
            from_label_id: label_id,
            to_label_id: input.to_label_id,
            reassigned,
        },
    }))
}
