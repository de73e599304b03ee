pub mod annotator;
pub mod auth;
pub mod games;
pub mod health;
pub mod images;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree.
///
/// Paths are mounted at the root to match the client contract.
///
/// ```text
/// /token                                  login (public)
/// /add_user                               register (public)
/// /renew_token                            fresh token (requires auth)
/// /users/me                               current user
///
/// /annotator/get_images_to_annotate       lease a batch (POST form)
/// /annotator/insert_annotation            submit an annotation (POST json)
///
/// /get_annotations                        payload table rows
/// /query_images                           images by metadata containment
/// /get_image                              one image with a signed URL
///
/// /get_game_list                          games the user may annotate
/// /get_game                               one game
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/annotator", annotator::router())
        .merge(images::router())
        .merge(games::router())
}
