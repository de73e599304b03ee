//! Handlers for image lookups and stored annotations.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use ultitracker_core::annotation::AnnotationType;
use ultitracker_core::error::CoreError;
use ultitracker_db::models::annotation::AnnotationRows;
use ultitracker_db::models::image::ImageLocation;
use ultitracker_db::repositories::{AnnotationRepo, ImageRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::annotator::ImgLocationResponse;
use crate::handlers::signed_url;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnnotationsQuery {
    pub annotation_table: String,
    pub img_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImagesQuery {
    /// JSON object; every key/value must appear in the image metadata.
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub img_id: String,
}

/// GET /get_annotations?annotation_table=&img_id=
pub async fn get_annotations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<AnnotationsQuery>,
) -> AppResult<Json<AnnotationRows>> {
    let annotation_type = AnnotationType::from_str(&params.annotation_table)?;
    let rows = AnnotationRepo::list(&state.pool, annotation_type, params.img_id.as_deref()).await?;
    tracing::debug!(
        annotation_type = %rows.annotation_type(),
        rows = rows.len(),
        "Listed annotations",
    );
    Ok(Json(rows))
}

/// GET /query_images?query=<json>
pub async fn query_images(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ImagesQuery>,
) -> AppResult<Json<Vec<ImageLocation>>> {
    let filter: serde_json::Value = serde_json::from_str(&params.query)
        .map_err(|e| AppError::BadRequest(format!("query is not valid JSON: {e}")))?;
    if !filter.is_object() {
        return Err(AppError::BadRequest("query must be a JSON object".into()));
    }

    let images = ImageRepo::query_metadata(&state.pool, &filter).await?;
    Ok(Json(images))
}

/// GET /get_image?img_id=
///
/// A single image location signed for the configured image TTL.
pub async fn get_image(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ImageQuery>,
) -> AppResult<Json<ImgLocationResponse>> {
    let image = ImageRepo::find_by_id(&state.pool, &params.img_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Image", &params.img_id)))?;

    let ttl = state.config.annotation.image_url_ttl;
    let img_path = signed_url(&state, &image.img_raw_path, ttl).await?;
    let expires_at = Utc::now()
        + chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::InternalError(format!("invalid image TTL: {e}")))?;

    Ok(Json(ImgLocationResponse {
        img_id: image.img_id,
        img_path,
        annotation_expiration_utc_time: expires_at,
    }))
}
