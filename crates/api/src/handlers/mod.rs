//! HTTP handlers, one module per resource.

pub mod annotator;
pub mod auth;
pub mod games;
pub mod images;

use std::time::Duration;

use crate::error::AppResult;
use crate::state::AppState;
use crate::storage::sign_raw_path;

/// Sign a stored raw path against the configured default bucket.
pub(crate) async fn signed_url(state: &AppState, raw_path: &str, ttl: Duration) -> AppResult<String> {
    let url = sign_raw_path(
        state.storage.as_ref(),
        raw_path,
        &state.config.storage.bucket,
        ttl,
    )
    .await?;
    Ok(url)
}
