//! Object store gateway.
//!
//! Frames and game media live in an object store; clients only ever receive
//! time-limited URLs. Raw paths stored in the database come in three shapes
//! (see [`ObjectLocation::parse`]) and are resolved to a bucket/key pair
//! before signing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;

use crate::config::{StorageBackend, StorageConfig};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("failed to sign URL: {0}")]
    Signing(String),
}

/// Issues time-limited URLs for stored objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn generate_signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;
}

/// Build the object store selected by configuration.
pub async fn build_object_store(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::S3 => Arc::new(S3ObjectStore::new(config).await),
        StorageBackend::Unsigned => Arc::new(UnsignedObjectStore::new(&config.public_base_url)),
    }
}

/// Sign a raw path as stored in `img_location` or game metadata.
pub async fn sign_raw_path(
    store: &dyn ObjectStore,
    raw_path: &str,
    default_bucket: &str,
    ttl: Duration,
) -> Result<String, StorageError> {
    let location = ObjectLocation::parse(raw_path, default_bucket)?;
    store
        .generate_signed_url(&location.bucket, &location.key, ttl)
        .await
}

// ---------------------------------------------------------------------------
// Raw path parsing
// ---------------------------------------------------------------------------

/// A bucket/key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    /// Resolve a stored raw path.
    ///
    /// Accepts `s3://bucket/key`, virtual-hosted S3 URLs
    /// (`https://bucket.s3[.region].amazonaws.com/key`) and bare keys, which
    /// resolve against `default_bucket`.
    pub fn parse(raw_path: &str, default_bucket: &str) -> Result<Self, StorageError> {
        let raw = raw_path.trim();
        let invalid = || StorageError::InvalidPath(raw_path.to_string());

        let (bucket, key) = if let Some(rest) = raw.strip_prefix("s3://") {
            rest.split_once('/').ok_or_else(invalid)?
        } else if let Some(rest) = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
        {
            let (host, key) = rest.split_once('/').ok_or_else(invalid)?;
            let (bucket, endpoint) = host.split_once(".s3").ok_or_else(invalid)?;
            if !endpoint.ends_with(".amazonaws.com") {
                return Err(invalid());
            }
            (bucket, key)
        } else if raw.contains("://") {
            return Err(invalid());
        } else {
            (default_bucket, raw.trim_start_matches('/'))
        };

        if bucket.is_empty() || key.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// Presigned `GetObject` URLs from S3 or an S3-compatible store.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain plus overrides.
    pub async fn new(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.endpoint.is_some() {
            // Custom endpoints rarely support virtual-hosted buckets.
            s3_config = s3_config.force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn generate_signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Signing(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Signing(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

// ---------------------------------------------------------------------------
// Unsigned
// ---------------------------------------------------------------------------

/// Plain public URLs; the TTL is ignored.
pub struct UnsignedObjectStore {
    base_url: String,
}

impl UnsignedObjectStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for UnsignedObjectStore {
    async fn generate_signed_url(
        &self,
        bucket: &str,
        key: &str,
        _ttl: Duration,
    ) -> Result<String, StorageError> {
        Ok(format!("{}/{bucket}/{key}", self.base_url))
    }
}
