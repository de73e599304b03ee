use std::sync::Arc;

use crate::config::ServerConfig;
use crate::storage::ObjectStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: ultitracker_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Signs URLs for frames and game media.
    pub storage: Arc<dyn ObjectStore>,
}
