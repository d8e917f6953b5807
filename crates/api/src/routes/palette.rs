use axum::routing::{get, post};
use axum::Router;

use crate::handlers::palette;
use crate::state::AppState;

/// Routes mounted at `/palette`.
///
/// ```text
/// GET    /            list_colors
/// GET    /next        next_color
/// POST   /random      random_color
/// POST   /contrast    contrast
/// POST   /adjust      adjust
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(palette::list_colors))
        .route("/next", get(palette::next_color))
        .route("/random", post(palette::random_color))
        .route("/contrast", post(palette::contrast))
        .route("/adjust", post(palette::adjust))
}
