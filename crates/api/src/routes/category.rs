use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::category;
use crate::state::AppState;

/// Routes mounted at `/categories`.
///
/// ```text
/// GET    /                  list (?include_inactive)
/// POST   /                  create
/// POST   /merge             merge
/// PUT    /{id}              update
/// DELETE /{id}              delete
/// POST   /{id}/recolor      recolor
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(category::list).post(category::create))
        .route("/merge", post(category::merge))
        .route("/{id}", put(category::update).delete(category::delete))
        .route("/{id}/recolor", post(category::recolor))
}
