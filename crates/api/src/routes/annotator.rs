//! Route definitions for the `/annotator` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::annotator;
use crate::state::AppState;

/// Routes mounted at `/annotator`.
///
/// ```text
/// POST /get_images_to_annotate  -> get_images_to_annotate
/// POST /insert_annotation       -> insert_annotation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/get_images_to_annotate",
            post(annotator::get_images_to_annotate),
        )
        .route("/insert_annotation", post(annotator::insert_annotation))
}
