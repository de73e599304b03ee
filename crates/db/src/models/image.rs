//! Image location model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ultitracker_core::annotation::ImgEncoding;
use ultitracker_core::types::{GameId, ImgId};

/// Column list shared across image queries. The enum column is read back
/// as text.
pub const IMAGE_COLUMNS: &str =
    "img_id, img_raw_path, img_type::text AS img_type, img_metadata, game_id, frame_number";

/// A row from the `img_location` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImageLocation {
    pub img_id: ImgId,
    pub img_raw_path: String,
    pub img_type: String,
    pub img_metadata: serde_json::Value,
    pub game_id: Option<GameId>,
    pub frame_number: Option<i32>,
}

/// DTO for inserting an extracted frame.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImage {
    pub img_id: ImgId,
    pub img_raw_path: String,
    pub img_type: ImgEncoding,
    #[serde(default = "empty_object")]
    pub img_metadata: serde_json::Value,
    pub game_id: Option<GameId>,
    pub frame_number: Option<i32>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}
