use axum::routing::{get, post};
use axum::Router;

use crate::handlers::document;
use crate::state::AppState;

/// Routes mounted at `/documents`.
///
/// ```text
/// GET    /{id}/cells                    list_cells
/// GET    /{id}/cells/annotatable        annotatable_cells
/// POST   /{id}/reclassify               reclassify
/// GET    /{id}/classification-stats     classification_stats
/// GET    /{id}/review-queue             review_queue
/// GET    /{id}/review-status            review_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/cells", get(document::list_cells))
        .route("/{id}/cells/annotatable", get(document::annotatable_cells))
        .route("/{id}/reclassify", post(document::reclassify))
        .route(
            "/{id}/classification-stats",
            get(document::classification_stats),
        )
        .route("/{id}/review-queue", get(document::review_queue))
        .route("/{id}/review-status", get(document::review_status))
}
