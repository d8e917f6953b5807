use axum::routing::{get, post};
use axum::Router;

use crate::handlers::annotation;
use crate::state::AppState;

/// Routes mounted at `/annotations`.
///
/// ```text
/// POST   /                  create_human
/// POST   /ai                create_ai
/// POST   /review-batch      review_batch
/// GET    /{id}              get_annotation
/// DELETE /{id}              delete (?performed_by)
/// POST   /{id}/accept       accept
/// POST   /{id}/reject       reject
/// POST   /{id}/edit         edit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(annotation::create_human))
        .route("/ai", post(annotation::create_ai))
        .route("/review-batch", post(annotation::review_batch))
        .route(
            "/{id}",
            get(annotation::get_annotation).delete(annotation::delete),
        )
        .route("/{id}/accept", post(annotation::accept))
        .route("/{id}/reject", post(annotation::reject))
        .route("/{id}/edit", post(annotation::edit))
}
