use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::label;
use crate::state::AppState;

/// Routes mounted at `/labels`.
///
/// ```text
/// GET    /                      list
/// POST   /                      create
/// POST   /merge                 merge
/// GET    /merge-suggestions     merge_suggestions
/// GET    /{id}                  get_label
/// PUT    /{id}                  update
/// DELETE /{id}                  delete
/// PUT    /{id}/active           set_active
/// POST   /{id}/reassign         reassign
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(label::list).post(label::create))
        .route("/merge", post(label::merge))
        .route("/merge-suggestions", get(label::merge_suggestions))
        .route(
            "/{id}",
            get(label::get_label)
                .put(label::update)
                .delete(label::delete),
        )
        .route("/{id}/active", put(label::set_active))
        .route("/{id}/reassign", post(label::reassign))
}
