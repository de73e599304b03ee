//! Game metadata model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ultitracker_core::types::GameId;

/// A row from the `game_metadata` table.
///
/// `data` holds the free-form metadata (name, home, away, date, length,
/// bucket). Media keys are kept in their own columns so they can be signed.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Game {
    pub game_id: GameId,
    pub data: serde_json::Value,
    pub thumbnail_key: Option<String>,
    pub video_key: Option<String>,
}

/// DTO for registering a game on behalf of its uploader.
#[derive(Debug, Deserialize)]
pub struct CreateGame {
    pub game_id: GameId,
    pub data: serde_json::Value,
    pub thumbnail_key: Option<String>,
    pub video_key: Option<String>,
}
