//! Handlers for the games a user may annotate.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use ultitracker_core::error::CoreError;
use ultitracker_core::types::GameId;
use ultitracker_db::models::game::Game;
use ultitracker_db::repositories::GameRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::storage::sign_raw_path;

#[derive(Debug, Deserialize)]
pub struct GameQuery {
    pub game_id: GameId,
}

/// A game with signed `thumbnail` and `video` URLs merged into `data`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GameResponse {
    pub game_id: GameId,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GameListResponse {
    pub game_list: Vec<GameResponse>,
}

/// GET /get_game_list
pub async fn get_game_list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<GameListResponse>> {
    let games = GameRepo::list_for_user(&state.pool, &auth.user.user_id).await?;

    let mut game_list = Vec::with_capacity(games.len());
    for game in games {
        game_list.push(game_response(&state, game).await);
    }
    Ok(Json(GameListResponse { game_list }))
}

/// GET /get_game?game_id=
///
/// Unknown games and games the user is not authorized for are both 404.
pub async fn get_game(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<GameQuery>,
) -> AppResult<Json<GameResponse>> {
    let game = GameRepo::find_for_user(&state.pool, &params.game_id, &auth.user.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Game", &params.game_id)))?;

    Ok(Json(game_response(&state, game).await))
}

/// Merge signed media URLs into the game's metadata. A key that cannot be
/// signed is logged and left out rather than failing the response.
async fn game_response(state: &AppState, game: Game) -> GameResponse {
    let mut data = match game.data {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    // Games may live in their own bucket; fall back to the configured one.
    let bucket = data
        .get("bucket")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(&state.config.storage.bucket)
        .to_string();
    let ttl = state.config.annotation.image_url_ttl;

    for (field, key) in [("thumbnail", &game.thumbnail_key), ("video", &game.video_key)] {
        let Some(key) = key else { continue };
        match sign_raw_path(state.storage.as_ref(), key, &bucket, ttl).await {
            Ok(url) => {
                data.insert(field.to_string(), serde_json::Value::String(url));
            }
            Err(e) => {
                tracing::warn!(game_id = %game.game_id, field, error = %e, "Omitting unsignable media URL");
            }
        }
    }

    GameResponse {
        game_id: game.game_id,
        data: serde_json::Value::Object(data),
    }
}
