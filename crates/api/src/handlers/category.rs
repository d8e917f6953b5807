//! Handlers for category maintenance.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thematic_core::types::DbId;
use thematic_db::models::category::{CreateCategory, UpdateCategory};
use thematic_db::taxonomy;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecolorRequest {
    pub color: String,
    /// Recolour labels with a custom colour as well.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MergeCategoriesRequest {
    #[validate(length(min = 1, max = 100))]
    pub source_ids: Vec<DbId>,
    pub target_id: DbId,
}

#[derive(Debug, Serialize)]
pub struct MergeCategoriesResponse {
    pub target_id: DbId,
    pub labels_moved: u64,
}

/// GET /api/v1/categories
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let categories = state.store().list_categories(params.include_inactive).await?;
    Ok(Json(DataResponse { data: categories }))
}

/// POST /api/v1/categories
///
/// Without a colour, the first palette colour no category uses is assigned.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> AppResult<impl IntoResponse> {
    let category = taxonomy::create_category(state.store(), &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: category })))
}

/// PUT /api/v1/categories/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(category_id): Path<DbId>,
    Json(input): Json<UpdateCategory>,
) -> AppResult<impl IntoResponse> {
    let category = taxonomy::update_category(state.store(), category_id, &input).await?;
    Ok(Json(DataResponse { data: category }))
}

/// POST /api/v1/categories/{id}/recolor
pub async fn recolor(
    State(state): State<AppState>,
    Path(category_id): Path<DbId>,
    Json(input): Json<RecolorRequest>,
) -> AppResult<impl IntoResponse> {
    let recolor =
        taxonomy::recolor_category(state.store(), category_id, &input.color, input.force).await?;
    Ok(Json(DataResponse { data: recolor }))
}

/// POST /api/v1/categories/merge
pub async fn merge(
    State(state): State<AppState>,
    Json(input): Json<MergeCategoriesRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let labels_moved =
        taxonomy::merge_categories(state.store(), &input.source_ids, input.target_id).await?;
    Ok(Json(DataResponse {
        data: MergeCategoriesResponse {
            target_id: input.target_id,
            labels_moved,
        },
    }))
}

/// DELETE /api/v1/categories/{id}
///
/// Labels of the category become uncategorised.
pub async fn delete(
    State(state): State<AppState>,
    Path(category_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    taxonomy::delete_category(state.store(), category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
