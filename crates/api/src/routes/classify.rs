use axum::routing::post;
use axum::Router;

use crate::handlers::classify;
use crate::state::AppState;

/// Routes mounted at `/classify`.
///
/// ```text
/// POST   /          classify
/// POST   /batch     classify_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(classify::classify))
        .route("/batch", post(classify::classify_batch))
}
