use std::time::Duration;

use ultitracker_db::models::lease::{MAX_BATCH_SIZE, MAX_LEASE_DURATION};
use ultitracker_db::DbConfig;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub db: DbConfig,
    pub storage: StorageConfig,
    pub annotation: AnnotationConfig,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

/// Which object store implementation signs media URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Presigned S3 `GetObject` URLs.
    S3,
    /// Plain `{base}/{bucket}/{key}` URLs, for local setups and tests.
    Unsigned,
}

impl StorageBackend {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "s3" => Some(Self::S3),
            "unsigned" => Some(Self::Unsigned),
            _ => None,
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket used for raw paths that carry no bucket of their own.
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack).
    pub endpoint: Option<String>,
    /// Base URL for the unsigned backend.
    pub public_base_url: String,
}

/// Dispatch queue settings.
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Lease length, also used as the TTL of dispatched image URLs.
    pub lease_duration: Duration,
    /// Images handed out per dispatch request.
    pub batch_size: u32,
    /// TTL of URLs returned by `/get_image` and the game endpoints.
    pub image_url_ttl: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `HOST`                       | `0.0.0.0`                  |
    /// | `PORT`                       | `3000`                     |
    /// | `CORS_ORIGINS`               | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                       |
    /// | `STORAGE_BACKEND`            | `s3`                       |
    /// | `STORAGE_BUCKET`             | `ultitracker-videos-test`  |
    /// | `STORAGE_REGION`             | unset                      |
    /// | `STORAGE_ENDPOINT`           | unset                      |
    /// | `STORAGE_PUBLIC_BASE_URL`    | `http://localhost:9000`    |
    /// | `ANNOTATION_EXPIRATION_SECS` | `10`                       |
    /// | `ANNOTATION_BATCH_SIZE`      | `1`                        |
    /// | `IMAGE_URL_TTL_SECS`         | `600`                      |
    ///
    /// Database variables are documented on [`DbConfig::from_env`], JWT
    /// variables on [`JwtConfig::from_env`].
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");

        let port: u16 = env_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            db: DbConfig::from_env(),
            storage: StorageConfig::from_env(),
            annotation: AnnotationConfig::from_env(),
            jwt: JwtConfig::from_env(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let backend_name = env_or("STORAGE_BACKEND", "s3");
        let backend = StorageBackend::from_name(&backend_name)
            .unwrap_or_else(|| panic!("STORAGE_BACKEND must be 's3' or 'unsigned', got '{backend_name}'"));

        Self {
            backend,
            bucket: env_or("STORAGE_BUCKET", "ultitracker-videos-test"),
            region: env_opt("STORAGE_REGION"),
            endpoint: env_opt("STORAGE_ENDPOINT"),
            public_base_url: env_or("STORAGE_PUBLIC_BASE_URL", "http://localhost:9000"),
        }
    }
}

impl AnnotationConfig {
    /// Panics unless every dispatch request built from these settings
    /// would pass lease request validation.
    pub fn new(lease_duration: Duration, batch_size: u32, image_url_ttl: Duration) -> Self {
        assert!(
            !lease_duration.is_zero() && lease_duration <= MAX_LEASE_DURATION,
            "ANNOTATION_EXPIRATION_SECS must be between 1 and {}",
            MAX_LEASE_DURATION.as_secs()
        );
        assert!(
            (1..=MAX_BATCH_SIZE).contains(&batch_size),
            "ANNOTATION_BATCH_SIZE must be between 1 and {MAX_BATCH_SIZE}"
        );

        Self {
            lease_duration,
            batch_size,
            image_url_ttl,
        }
    }

    pub fn from_env() -> Self {
        let lease_secs: u64 = env_or("ANNOTATION_EXPIRATION_SECS", "10")
            .parse()
            .expect("ANNOTATION_EXPIRATION_SECS must be a valid u64");

        let batch_size: u32 = env_or("ANNOTATION_BATCH_SIZE", "1")
            .parse()
            .expect("ANNOTATION_BATCH_SIZE must be a valid u32");

        let ttl_secs: u64 = env_or("IMAGE_URL_TTL_SECS", "600")
            .parse()
            .expect("IMAGE_URL_TTL_SECS must be a valid u64");

        Self::new(
            Duration::from_secs(lease_secs),
            batch_size,
            Duration::from_secs(ttl_secs),
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
