//! Handlers for the annotator work queue.

use axum::extract::State;
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use ultitracker_core::annotation::{AnnotationPayload, AnnotationType, OrderPolicy};
use ultitracker_core::error::CoreError;
use ultitracker_core::types::{ImgId, Timestamp};
use ultitracker_db::models::lease::LeaseRequest;
use ultitracker_db::repositories::{AnnotationQueueRepo, AnnotationRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::signed_url;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Form body for `POST /annotator/get_images_to_annotate`.
#[derive(Debug, Deserialize)]
pub struct ImagesToAnnotateForm {
    /// Space-separated game ids.
    pub game_ids: String,
    pub annotation_type: String,
    /// `random`/`sequential`, or `0`/`1`.
    pub order_type: String,
}

/// One leased image with a URL valid for the lease.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImgLocationResponse {
    pub img_id: ImgId,
    pub img_path: String,
    pub annotation_expiration_utc_time: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImgLocationListResponse {
    pub img_locations: Vec<ImgLocationResponse>,
}

/// JSON body for `POST /annotator/insert_annotation`.
#[derive(Debug, Deserialize)]
pub struct InsertAnnotationRequest {
    pub img_id: ImgId,
    pub annotation_table: String,
    pub annotation: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /annotator/get_images_to_annotate
///
/// Lease the next batch of images for the requested games and return
/// URLs that stay valid for the lease.
pub async fn get_images_to_annotate(
    State(state): State<AppState>,
    auth: AuthUser,
    Form(input): Form<ImagesToAnnotateForm>,
) -> AppResult<Json<ImgLocationListResponse>> {
    let annotation_type = AnnotationType::from_str(&input.annotation_type)?;
    let order = OrderPolicy::from_str(&input.order_type)?;
    let game_ids: Vec<String> = input.game_ids.split_whitespace().map(str::to_string).collect();

    let config = &state.config.annotation;
    let request = LeaseRequest::new(
        game_ids,
        annotation_type,
        order,
        config.batch_size,
        config.lease_duration,
    )?;

    // Leases only commit once every URL is signed; an early return drops
    // the transaction and leaves the whole batch available.
    let mut tx = state.pool.begin().await?;
    let leased = AnnotationQueueRepo::lease_next_in(&mut tx, &request, Utc::now()).await?;

    let mut img_locations = Vec::with_capacity(leased.len());
    for image in leased {
        let img_path = signed_url(&state, &image.raw_path, config.lease_duration)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    img_id = %image.img_id,
                    raw_path = %image.raw_path,
                    error = %e,
                    "Cannot sign leased image, withdrawing batch",
                );
            })?;
        img_locations.push(ImgLocationResponse {
            img_id: image.img_id,
            img_path,
            annotation_expiration_utc_time: image.lease_expires_at,
        });
    }

    tx.commit().await?;

    tracing::debug!(
        user_id = %auth.user.user_id,
        annotation_type = %annotation_type,
        count = img_locations.len(),
        "Dispatched images",
    );

    Ok(Json(ImgLocationListResponse { img_locations }))
}

/// POST /annotator/insert_annotation
///
/// Validate and store an annotation. Returns `true` on success.
pub async fn insert_annotation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<InsertAnnotationRequest>,
) -> AppResult<Json<bool>> {
    let annotation_type = AnnotationType::from_str(&input.annotation_table)?;
    let payload = AnnotationPayload::parse(annotation_type, &input.img_id, &input.annotation)?;

    let submission = AnnotationRepo::submit(&state.pool, &input.img_id, &payload, Utc::now())
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Image", &input.img_id)))?;

    tracing::debug!(
        user_id = %auth.user.user_id,
        img_id = %submission.img_id,
        rows = submission.rows_written,
        "Stored annotation",
    );

    Ok(Json(true))
}
