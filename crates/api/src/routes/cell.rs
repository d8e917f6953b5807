use axum::routing::{get, post};
use axum::Router;

use crate::handlers::cell;
use crate::state::AppState;

/// Routes mounted at `/cells`.
///
/// ```text
/// GET    /{id}                get_cell
/// GET    /{id}/annotations    list_annotations
/// GET    /{id}/history        history
/// POST   /{id}/classify       classify
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(cell::get_cell))
        .route("/{id}/annotations", get(cell::list_annotations))
        .route("/{id}/history", get(cell::history))
        .route("/{id}/classify", post(cell::classify))
}
