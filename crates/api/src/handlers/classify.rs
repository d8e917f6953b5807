//! Handlers for ad-hoc question classification.
//!
//! These endpoints classify question/response pairs sent in the request
//! body and write nothing; stored cells are classified through the document
//! and cell endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thematic_core::classifier::{Classification, QuestionClassifier, QuestionType};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ClassifyRequest {
    #[validate(length(max = 5000))]
    pub question: String,
    #[validate(length(max = 20000))]
    pub response: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClassifyBatchRequest {
    #[validate(length(min = 1, max = 500))]
    pub items: Vec<ClassifyRequest>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub question_type: QuestionType,
    pub confidence: f64,
    pub should_annotate: bool,
}

impl From<Classification> for ClassifyResponse {
    fn from(result: Classification) -> Self {
        Self {
            question_type: result.question_type,
            confidence: result.confidence,
            should_annotate: result.should_annotate(),
        }
    }
}

fn classify_one(classifier: &QuestionClassifier, input: &ClassifyRequest) -> ClassifyResponse {
    classifier
        .classify(&input.question, input.response.as_deref())
        .into()
}

/// POST /api/v1/classify
pub async fn classify(
    State(state): State<AppState>,
    Json(input): Json<ClassifyRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let result = classify_one(&state.classifier, &input);
    tracing::debug!(
        question_type = result.question_type.as_str(),
        confidence = result.confidence,
        "Question classified",
    );
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/classify/batch
///
/// Results are returned in request order.
pub async fn classify_batch(
    State(state): State<AppState>,
    Json(input): Json<ClassifyBatchRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    for item in &input.items {
        item.validate()?;
    }
    let results: Vec<ClassifyResponse> = input
        .items
        .iter()
        .map(|item| classify_one(&state.classifier, item))
        .collect();
    Ok(Json(DataResponse { data: results }))
}
