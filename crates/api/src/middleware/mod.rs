//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the authenticated, enabled user behind a request.

pub mod auth;
