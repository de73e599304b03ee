//! Route definitions for accounts and sessions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// ```text
/// POST /token        -> login
/// POST /add_user     -> add_user
/// POST /renew_token  -> renew_token (requires auth)
/// GET  /users/me     -> me (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/token", post(auth::login))
        .route("/add_user", post(auth::add_user))
        .route("/renew_token", post(auth::renew_token))
        .route("/users/me", get(auth::me))
}
