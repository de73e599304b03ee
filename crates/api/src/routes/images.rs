use axum::routing::get;
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// ```text
/// GET /get_annotations  -> get_annotations
/// GET /query_images     -> query_images
/// GET /get_image        -> get_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get_annotations", get(images::get_annotations))
        .route("/query_images", get(images::query_images))
        .route("/get_image", get(images::get_image))
}
