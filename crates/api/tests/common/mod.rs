#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use ultitracker_api::auth::jwt::{generate_access_token, JwtConfig};
use ultitracker_api::auth::password::hash_password;
use ultitracker_api::config::{
    AnnotationConfig, ServerConfig, StorageBackend, StorageConfig,
};
use ultitracker_api::router::build_app_router;
use ultitracker_api::state::AppState;
use ultitracker_api::storage::UnsignedObjectStore;
use ultitracker_core::annotation::{AnnotationPayload, ImgEncoding};
use ultitracker_db::models::game::CreateGame;
use ultitracker_db::models::image::CreateImage;
use ultitracker_db::models::user::{CreateUser, User};
use ultitracker_db::repositories::{AnnotationRepo, GameRepo, ImageRepo, UserRepo};
use ultitracker_db::DbConfig;

pub const SCHEMA: &str = "public";
pub const BUCKET: &str = "ultitracker-videos-test";
pub const MEDIA_BASE: &str = "http://media.test";
pub const PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
///
/// The unsigned object store keeps URLs deterministic and the lease is one
/// hour so a dispatched image stays leased for the whole test.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        db: DbConfig {
            database_url: None,
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            database: "ultitracker".to_string(),
            schema: SCHEMA.to_string(),
            max_connections: 5,
            connect_retries: 1,
            connect_backoff: Duration::from_millis(10),
        },
        storage: StorageConfig {
            backend: StorageBackend::Unsigned,
            bucket: BUCKET.to_string(),
            region: None,
            endpoint: None,
            public_base_url: MEDIA_BASE.to_string(),
        },
        annotation: AnnotationConfig {
            lease_duration: Duration::from_secs(3600),
            batch_size: 2,
            image_url_ttl: Duration::from_secs(600),
        },
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 30,
        },
    }
}

/// Initialise the schema and build the full application router, with the
/// same middleware stack production uses.
pub async fn build_test_app(pool: PgPool) -> Router {
    ultitracker_db::schema::initialize(&pool, SCHEMA)
        .await
        .expect("schema initialisation should succeed");

    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        storage: Arc::new(UnsignedObjectStore::new(MEDIA_BASE)),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST an urlencoded form; `token` is sent as a bearer token when given.
pub async fn post_form(
    app: Router,
    uri: &str,
    fields: &[(&str, &str)],
    token: Option<&str>,
) -> Response<Body> {
    let body = serde_urlencoded::to_string(fields).unwrap();
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(body)).unwrap()).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Create a user with [`PASSWORD`] and return it with a valid access token.
pub async fn seed_user(pool: &PgPool, username: &str) -> (User, String) {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@test.com"),
            full_name: format!("{username} tester"),
            salted_password: hash_password(PASSWORD).unwrap(),
        },
    )
    .await
    .unwrap();
    let token = generate_access_token(&user.user_id, &test_config().jwt).unwrap();
    (user, token)
}

/// Create a game owned by `owner_id`.
pub async fn seed_game(pool: &PgPool, game_id: &str, owner_id: &str) {
    GameRepo::create(
        pool,
        &CreateGame {
            game_id: game_id.to_string(),
            data: serde_json::json!({ "name": format!("{game_id} final"), "home": "A", "away": "B" }),
            thumbnail_key: Some(format!("{game_id}/thumbnail.jpg")),
            video_key: Some(format!("s3://videos/{game_id}/full.mp4")),
        },
        owner_id,
    )
    .await
    .unwrap();
}

/// Insert a frame with a valid camera-angle label so it is dispatchable
/// for every annotation type.
pub async fn seed_frame(pool: &PgPool, img_id: &str, game_id: &str, frame_number: i32) {
    let raw_path = format!("s3://frames/{game_id}/{img_id}.jpg");
    seed_frame_at(pool, img_id, game_id, frame_number, &raw_path).await;
}

/// [`seed_frame`] with an explicit raw object path.
pub async fn seed_frame_at(
    pool: &PgPool,
    img_id: &str,
    game_id: &str,
    frame_number: i32,
    raw_path: &str,
) {
    ImageRepo::create(
        pool,
        &CreateImage {
            img_id: img_id.to_string(),
            img_raw_path: raw_path.to_string(),
            img_type: ImgEncoding::Jpeg,
            img_metadata: serde_json::json!({ "game_id": game_id, "frame": frame_number }),
            game_id: Some(game_id.to_string()),
            frame_number: Some(frame_number),
        },
    )
    .await
    .unwrap();
    AnnotationRepo::submit(
        pool,
        img_id,
        &AnnotationPayload::CameraAngle { is_valid: true },
        chrono::Utc::now() - chrono::Duration::hours(1),
    )
    .await
    .unwrap()
    .expect("image should exist");
}
