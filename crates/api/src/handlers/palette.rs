//! Handlers for colour palette utilities.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thematic_core::palette::{
    adjust_color, generate_random_color, get_contrasting_text_color, DEFAULT_COLORS,
};
use thematic_db::taxonomy;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ColorResponse {
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct ContrastRequest {
    pub background: String,
}

#[derive(Debug, Serialize)]
pub struct ContrastResponse {
    pub background: String,
    pub text_color: &'static str,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RandomColorRequest {
    /// Colours the result must stay visually distinct from.
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub avoid: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustRequest {
    pub color: String,
    #[serde(default)]
    #[validate(range(min = -360.0, max = 360.0))]
    pub hue_shift: f64,
    #[serde(default = "unit_factor")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub saturation_factor: f64,
    #[serde(default = "unit_factor")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub lightness_factor: f64,
}

fn unit_factor() -> f64 {
    1.0
}

/// GET /api/v1/palette
pub async fn list_colors() -> impl IntoResponse {
    Json(DataResponse {
        data: DEFAULT_COLORS,
    })
}

/// GET /api/v1/palette/next
///
/// The colour the next new category would receive.
pub async fn next_color(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let color = taxonomy::next_category_color(state.store()).await?;
    Ok(Json(DataResponse {
        data: ColorResponse { color },
    }))
}

/// POST /api/v1/palette/random
pub async fn random_color(Json(input): Json<RandomColorRequest>) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let color = generate_random_color(&input.avoid);
    Ok(Json(DataResponse {
        data: ColorResponse { color },
    }))
}

/// POST /api/v1/palette/contrast
///
/// Black or white, whichever reads better on `background`.
pub async fn contrast(Json(input): Json<ContrastRequest>) -> AppResult<impl IntoResponse> {
    let text_color = get_contrasting_text_color(&input.background)?;
    Ok(Json(DataResponse {
        data: ContrastResponse {
            background: input.background,
            text_color,
        },
    }))
}

/// POST /api/v1/palette/adjust
pub async fn adjust(Json(input): Json<AdjustRequest>) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let color = adjust_color(
        &input.color,
        input.hue_shift,
        input.saturation_factor,
        input.lightness_factor,
    )?;
    Ok(Json(DataResponse {
        data: ColorResponse { color },
    }))
}
