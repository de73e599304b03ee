use axum::routing::get;
use axum::Router;

use crate::handlers::games;
use crate::state::AppState;

/// ```text
/// GET /get_game_list  -> get_game_list
/// GET /get_game       -> get_game
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get_game_list", get(games::get_game_list))
        .route("/get_game", get(games::get_game))
}
