//! Repository for annotation payload tables and submission.

use sqlx::{PgPool, Postgres, Transaction};
use ultitracker_core::annotation::{
    AnnotationAction, AnnotationPayload, AnnotationType, BoundingBox, LineSegment,
};
use ultitracker_core::types::Timestamp;

use crate::models::annotation::{
    AnnotationRows, AnnotationTransaction, CameraAngleRow, FieldLineRow, PlayerBboxRow,
    Submission,
};

pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Store a validated annotation and mark the image submitted.
    ///
    /// The "submitted" log row and every payload row are written in one
    /// transaction. An empty box or line list writes the log row only.
    /// Returns `None` if `img_id` does not exist. A second submission for
    /// the same image and type fails on `uq_annotation_transaction_submitted`.
    pub async fn submit(
        pool: &PgPool,
        img_id: &str,
        payload: &AnnotationPayload,
        now: Timestamp,
    ) -> Result<Option<Submission>, sqlx::Error> {
        let annotation_type = payload.annotation_type();
        let mut tx = pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM img_location WHERE img_id = $1)")
                .bind(img_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO annotation_transaction (img_id, timestamp, table_ref, action)
             VALUES ($1, $2, $3::annotation_table, $4::annotation_action)",
        )
        .bind(img_id)
        .bind(now)
        .bind(annotation_type.as_str())
        .bind(AnnotationAction::Submitted.as_str())
        .execute(&mut *tx)
        .await?;

        match payload {
            AnnotationPayload::PlayerBboxes(boxes) => {
                for bbox in boxes {
                    insert_bbox(&mut tx, img_id, bbox).await?;
                }
            }
            AnnotationPayload::FieldLines(lines) => {
                for line in lines {
                    insert_line(&mut tx, img_id, line).await?;
                }
            }
            AnnotationPayload::CameraAngle { is_valid } => {
                sqlx::query("INSERT INTO camera_angle (img_id, is_valid) VALUES ($1, $2)")
                    .bind(img_id)
                    .bind(*is_valid)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            img_id,
            annotation_type = %annotation_type,
            rows = payload.row_count(),
            "Annotation submitted",
        );

        Ok(Some(Submission {
            img_id: img_id.to_string(),
            annotation_type,
            submitted_at: now,
            rows_written: payload.row_count(),
        }))
    }

    /// Raw rows of one payload table, optionally restricted to one image.
    pub async fn list(
        pool: &PgPool,
        annotation_type: AnnotationType,
        img_id: Option<&str>,
    ) -> Result<AnnotationRows, sqlx::Error> {
        Ok(match annotation_type {
            AnnotationType::PlayerBbox => AnnotationRows::PlayerBbox(
                sqlx::query_as::<_, PlayerBboxRow>(
                    "SELECT img_id,
                            (bbox[1])[0] AS x1, (bbox[1])[1] AS y1,
                            (bbox[0])[0] AS x2, (bbox[0])[1] AS y2,
                            player_id
                     FROM player_bbox
                     WHERE $1::text IS NULL OR img_id = $1
                     ORDER BY img_id",
                )
                .bind(img_id)
                .fetch_all(pool)
                .await?,
            ),
            AnnotationType::FieldLines => AnnotationRows::FieldLines(
                sqlx::query_as::<_, FieldLineRow>(
                    "SELECT img_id,
                            (line_coords[0])[0] AS x1, (line_coords[0])[1] AS y1,
                            (line_coords[1])[0] AS x2, (line_coords[1])[1] AS y2,
                            line_type::text AS line_id
                     FROM field_lines
                     WHERE $1::text IS NULL OR img_id = $1
                     ORDER BY img_id, line_type",
                )
                .bind(img_id)
                .fetch_all(pool)
                .await?,
            ),
            AnnotationType::CameraAngle => AnnotationRows::CameraAngle(
                sqlx::query_as::<_, CameraAngleRow>(
                    "SELECT img_id, is_valid
                     FROM camera_angle
                     WHERE $1::text IS NULL OR img_id = $1
                     ORDER BY img_id",
                )
                .bind(img_id)
                .fetch_all(pool)
                .await?,
            ),
        })
    }

    /// The full transaction log of one image, oldest first.
    pub async fn transactions_for_image(
        pool: &PgPool,
        img_id: &str,
    ) -> Result<Vec<AnnotationTransaction>, sqlx::Error> {
        sqlx::query_as::<_, AnnotationTransaction>(
            "SELECT img_id, timestamp, table_ref::text AS table_ref, action::text AS action
             FROM annotation_transaction
             WHERE img_id = $1
             ORDER BY timestamp, table_ref, action",
        )
        .bind(img_id)
        .fetch_all(pool)
        .await
    }
}

async fn insert_bbox(
    tx: &mut Transaction<'_, Postgres>,
    img_id: &str,
    bbox: &BoundingBox,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO player_bbox (img_id, bbox, player_id)
         VALUES ($1, box(point($2, $3), point($4, $5)), $6)",
    )
    .bind(img_id)
    .bind(bbox.x1)
    .bind(bbox.y1)
    .bind(bbox.x2)
    .bind(bbox.y2)
    .bind(&bbox.player_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    img_id: &str,
    line: &LineSegment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO field_lines (img_id, line_coords, line_type)
         VALUES ($1, lseg(point($2, $3), point($4, $5)), $6::line_id)",
    )
    .bind(img_id)
    .bind(line.x1)
    .bind(line.y1)
    .bind(line.x2)
    .bind(line.y2)
    .bind(line.line_id.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
