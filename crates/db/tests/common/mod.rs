#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use ultitracker_core::annotation::{AnnotationPayload, ImgEncoding};
use ultitracker_db::models::image::CreateImage;
use ultitracker_db::repositories::{AnnotationRepo, ImageRepo};

/// Schema used by tests; each `#[sqlx::test]` database is fresh.
pub const SCHEMA: &str = "public";

/// A fixed instant so lease arithmetic is exact.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Create every catalog table.
pub async fn init(pool: &PgPool) {
    ultitracker_db::schema::initialize(pool, SCHEMA)
        .await
        .expect("schema initialisation should succeed");
}

/// Insert a bare game row; dispatch does not look at authorization.
pub async fn seed_game(pool: &PgPool, game_id: &str) {
    sqlx::query("INSERT INTO game_metadata (game_id, data) VALUES ($1, '{}'::jsonb)")
        .bind(game_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Insert an extracted frame belonging to `game_id`.
pub async fn seed_image(pool: &PgPool, img_id: &str, game_id: &str, frame_number: i32) {
    ImageRepo::create(
        pool,
        &CreateImage {
            img_id: img_id.to_string(),
            img_raw_path: format!("s3://frames/{game_id}/{img_id}.jpg"),
            img_type: ImgEncoding::Jpeg,
            img_metadata: serde_json::json!({ "game_id": game_id, "frame": frame_number }),
            game_id: Some(game_id.to_string()),
            frame_number: Some(frame_number),
        },
    )
    .await
    .unwrap();
}

/// Record a camera-angle label for an image.
pub async fn label_camera(pool: &PgPool, img_id: &str, is_valid: bool) {
    AnnotationRepo::submit(
        pool,
        img_id,
        &AnnotationPayload::CameraAngle { is_valid },
        t0() - chrono::Duration::hours(1),
    )
    .await
    .unwrap()
    .expect("image should exist");
}

/// Seed a game with frames and give every frame a valid camera angle.
pub async fn seed_ready_game(pool: &PgPool, game_id: &str, frames: &[(&str, i32)]) {
    seed_game(pool, game_id).await;
    for (img_id, frame) in frames {
        seed_image(pool, img_id, game_id, *frame).await;
        label_camera(pool, img_id, true).await;
    }
}

pub async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}
