//! Handlers for accounts and sessions.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use ultitracker_core::error::CoreError;
use ultitracker_db::models::user::{CreateUser, UserResponse};
use ultitracker_db::repositories::UserRepo;
use validator::Validate;

use crate::auth::jwt::{generate_access_token, ACCESS_TOKEN_COOKIE};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Form body for `POST /add_user`.
#[derive(Debug, Deserialize, Validate)]
pub struct AddUserForm {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
}

/// Form body for `POST /token`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /add_user
///
/// Register an account. A taken username is a 409.
pub async fn add_user(
    State(state): State<AppState>,
    Form(input): Form<AddUserForm>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let salted_password = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            full_name: input.full_name.trim().to_string(),
            salted_password,
        },
    )
    .await?;

    tracing::info!(user_id = %user.user_id, username = %user.username, "User created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /token
///
/// Log in with username + password. The access token is returned in the
/// body and set as the session cookie.
pub async fn login(
    State(state): State<AppState>,
    Form(input): Form<LoginForm>,
) -> AppResult<(HeaderMap, Json<TokenResponse>)> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Incorrect username or password".into()));

    let user = UserRepo::find_by_username(&state.pool, input.username.trim())
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.salted_password)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        return Err(invalid());
    }

    if user.disabled {
        return Err(AppError::Core(CoreError::Forbidden("Account is disabled".into())));
    }

    issue_token(&state, &user.user_id)
}

/// POST /renew_token
///
/// Exchange a still-valid session for a fresh token.
pub async fn renew_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<(HeaderMap, Json<TokenResponse>)> {
    issue_token(&state, &auth.user.user_id)
}

/// GET /users/me
pub async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json(auth.user.into())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn issue_token(state: &AppState, user_id: &str) -> AppResult<(HeaderMap, Json<TokenResponse>)> {
    let jwt = &state.config.jwt;
    let access_token = generate_access_token(user_id, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    let expires_in = jwt.access_token_expiry_secs();

    let cookie = format!(
        "{ACCESS_TOKEN_COOKIE}={access_token}; Max-Age={expires_in}; Path=/; HttpOnly; SameSite=Lax"
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::InternalError(format!("Invalid cookie header: {e}")))?,
    );

    Ok((
        headers,
        Json(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
        }),
    ))
}
