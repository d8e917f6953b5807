pub mod annotation;
pub mod category;
pub mod cell;
pub mod classify;
pub mod document;
pub mod health;
pub mod label;
pub mod palette;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /classify                                        classify one pair (POST)
/// /classify/batch                                  classify many pairs (POST)
///
/// /documents/{id}/cells                            list cells (?only_unclassified)
/// /documents/{id}/cells/annotatable                annotatable cells (?min_confidence)
/// /documents/{id}/reclassify                       classify and store (POST, ?force)
/// /documents/{id}/classification-stats             counts by type and flag
/// /documents/{id}/review-queue                     pending AI proposals
/// /documents/{id}/review-status                    review progress
///
/// /cells/{id}                                      get
/// /cells/{id}/annotations                          annotations on the cell
/// /cells/{id}/history                              audit trail
/// /cells/{id}/classify                             classify and store (POST)
///
/// /annotations                                     human create (POST)
/// /annotations/ai                                  AI proposal (POST)
/// /annotations/review-batch                        batch accept/reject (POST)
/// /annotations/{id}                                get, delete
/// /annotations/{id}/accept                         accept (POST)
/// /annotations/{id}/reject                         reject (POST)
/// /annotations/{id}/edit                           replace label (POST)
///
/// /labels                                          list, create
/// /labels/merge                                    merge (POST)
/// /labels/merge-suggestions                        near-duplicate groups
/// /labels/{id}                                     get, update, delete
/// /labels/{id}/active                              soft-delete / restore (PUT)
/// /labels/{id}/reassign                            move annotations (POST)
///
/// /categories                                      list, create
/// /categories/merge                                merge (POST)
/// /categories/{id}                                 update, delete
/// /categories/{id}/recolor                         recolour (POST)
///
/// /palette                                         default colours
/// /palette/next                                    next free category colour
/// /palette/random                                  random distinct colour (POST)
/// /palette/contrast                                text colour for a background (POST)
/// /palette/adjust                                  shift hue/saturation/lightness (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/classify", classify::router())
        .nest("/documents", document::router())
        .nest("/cells", cell::router())
        .nest("/annotations", annotation::router())
        .nest("/labels", label::router())
        .nest("/categories", category::router())
        .nest("/palette", palette::router())
}
