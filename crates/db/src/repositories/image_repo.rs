//! Repository for the `img_location` table.

use sqlx::PgPool;

use crate::models::image::{CreateImage, ImageLocation, IMAGE_COLUMNS};

pub struct ImageRepo;

impl ImageRepo {
    /// Register an extracted frame.
    pub async fn create(pool: &PgPool, input: &CreateImage) -> Result<ImageLocation, sqlx::Error> {
        let query = format!(
            "INSERT INTO img_location
                (img_id, img_raw_path, img_type, img_metadata, game_id, frame_number)
             VALUES ($1, $2, $3::img_encoding, $4, $5, $6)
             RETURNING {IMAGE_COLUMNS}"
        );
        sqlx::query_as::<_, ImageLocation>(&query)
            .bind(&input.img_id)
            .bind(&input.img_raw_path)
            .bind(input.img_type.as_str())
            .bind(&input.img_metadata)
            .bind(&input.game_id)
            .bind(input.frame_number)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        img_id: &str,
    ) -> Result<Option<ImageLocation>, sqlx::Error> {
        let query = format!("SELECT {IMAGE_COLUMNS} FROM img_location WHERE img_id = $1");
        sqlx::query_as::<_, ImageLocation>(&query)
            .bind(img_id)
            .fetch_optional(pool)
            .await
    }

    /// Images whose metadata contains every key/value pair of `filter`.
    ///
    /// `filter` should be a JSON object; `{}` matches every image.
    pub async fn query_metadata(
        pool: &PgPool,
        filter: &serde_json::Value,
    ) -> Result<Vec<ImageLocation>, sqlx::Error> {
        let query = format!(
            "SELECT {IMAGE_COLUMNS} FROM img_location
             WHERE img_metadata @> $1
             ORDER BY game_id NULLS LAST, frame_number NULLS LAST, img_id"
        );
        sqlx::query_as::<_, ImageLocation>(&query)
            .bind(filter)
            .fetch_all(pool)
            .await
    }
}
