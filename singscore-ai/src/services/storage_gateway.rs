//! Object storage gateway
//!
//! Stores normalized audio and hands back a presigned, time-limited read URL
//! that the transcription service can fetch.
//!
//! # Modes
//! - **Live:** credentials present and the backend answered the startup probe.
//!   Uploads are retried a bounded number of times; on exhaustion (or signing
//!   failure) a placeholder reference is returned.
//! - **Simulated:** decided once at startup and kept for the process lifetime.
//!   Every `store` returns a placeholder reference without network access.
//!
//! `store` never fails; storage errors stay inside this module.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::models::{StorageOrigin, StoredAudioRef};

/// Host used for synthesized references; `.invalid` never resolves
const PLACEHOLDER_BASE_URL: &str = "https://placeholder.invalid";

/// Per-call timeout for storage requests
const STORAGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("URL signing failed: {0}")]
    Sign(String),

    #[error("Storage misconfigured: {0}")]
    Config(String),
}

/// Two-operation object storage contract, plus a connectivity probe
#[async_trait]
pub trait ObjectStorageBackend: Send + Sync {
    /// Upload `bytes` under `key`
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// Presign a GET URL for `key` valid for `ttl`
    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Cheap request proving the backend is reachable with these credentials
    async fn probe(&self) -> Result<(), StorageError>;
}

/// S3-compatible backend (AWS S3, Aliyun OSS, MinIO, ...)
pub struct S3ObjectStorage {
    inner: AmazonS3,
    probe_prefix: ObjectPath,
}

impl S3ObjectStorage {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .as_deref()
            .ok_or_else(|| StorageError::Config("bucket required".into()))?;
        let key_id = config
            .access_key_id
            .as_deref()
            .ok_or_else(|| StorageError::Config("access_key_id required".into()))?;
        let secret = config
            .access_key_secret
            .as_deref()
            .ok_or_else(|| StorageError::Config("access_key_secret required".into()))?;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_access_key_id(key_id)
            .with_secret_access_key(secret)
            .with_region(config.region.as_deref().unwrap_or("us-east-1"))
            .with_client_options(ClientOptions::new().with_timeout(STORAGE_REQUEST_TIMEOUT));

        if let Some(endpoint) = config.endpoint.as_deref() {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(true);
        }

        let inner = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            inner,
            probe_prefix: ObjectPath::from(config.key_prefix.as_str()),
        })
    }
}

#[async_trait]
impl ObjectStorageBackend for S3ObjectStorage {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.inner
            .put(&ObjectPath::from(key), PutPayload::from(bytes))
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Upload(e.to_string()))
    }

    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        self.inner
            .signed_url(http::Method::GET, &ObjectPath::from(key), ttl)
            .await
            .map(|url| url.to_string())
            .map_err(|e| StorageError::Sign(e.to_string()))
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.inner
            .list_with_delimiter(Some(&self.probe_prefix))
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

enum GatewayMode {
    Live(Arc<dyn ObjectStorageBackend>),
    Simulated,
}

/// Stores audio blobs and returns fetchable references
pub struct StorageGateway {
    mode: GatewayMode,
    key_prefix: String,
    url_ttl: Duration,
    upload_attempts: u32,
}

impl StorageGateway {
    /// Gateway permanently in simulated mode
    pub fn simulated(config: &StorageConfig) -> Self {
        Self {
            mode: GatewayMode::Simulated,
            key_prefix: config.key_prefix.clone(),
            url_ttl: config.url_ttl(),
            upload_attempts: config.upload_attempts.max(1),
        }
    }

    /// Gateway using `backend` without probing it
    pub fn live(backend: Arc<dyn ObjectStorageBackend>, config: &StorageConfig) -> Self {
        Self {
            mode: GatewayMode::Live(backend),
            ..Self::simulated(config)
        }
    }

    /// Resolve the gateway mode once at startup
    ///
    /// Missing or placeholder credentials, a misconfigured backend, or a failed
    /// probe all yield a simulated gateway.
    pub async fn connect(config: &StorageConfig) -> Self {
        if !config.has_credentials() {
            tracing::info!("Storage credentials not configured, using simulated storage");
            return Self::simulated(config);
        }

        match S3ObjectStorage::from_config(config) {
            Ok(backend) => Self::connect_with(Arc::new(backend), config).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build storage backend, using simulated storage");
                Self::simulated(config)
            }
        }
    }

    /// Probe `backend` once and pick the mode accordingly
    pub async fn connect_with(backend: Arc<dyn ObjectStorageBackend>, config: &StorageConfig) -> Self {
        let probe = tokio::time::timeout(STORAGE_REQUEST_TIMEOUT, backend.probe()).await;
        match probe {
            Ok(Ok(())) => {
                tracing::info!("Object storage reachable, live uploads enabled");
                Self::live(backend, config)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Object storage probe failed, using simulated storage");
                Self::simulated(config)
            }
            Err(_) => {
                tracing::warn!("Object storage probe timed out, using simulated storage");
                Self::simulated(config)
            }
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, GatewayMode::Live(_))
    }

    /// Store `bytes` and return a fetchable reference; never fails
    pub async fn store(&self, bytes: Bytes) -> StoredAudioRef {
        let backend = match &self.mode {
            GatewayMode::Live(backend) => backend,
            GatewayMode::Simulated => {
                tracing::debug!(size = bytes.len(), "Simulated upload");
                return self.placeholder();
            }
        };

        match self.try_store(backend.as_ref(), bytes).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Storage unavailable for this request, using placeholder URL");
                self.placeholder()
            }
        }
    }

    /// Upload with bounded retries, then sign
    async fn try_store(
        &self,
        backend: &dyn ObjectStorageBackend,
        bytes: Bytes,
    ) -> Result<StoredAudioRef, StorageError> {
        let key = format!("{}/{}.wav", self.key_prefix.trim_end_matches('/'), Uuid::new_v4());
        let size = bytes.len();

        let mut attempt = 1;
        loop {
            match backend.put(&key, bytes.clone()).await {
                Ok(()) => break,
                Err(e) if attempt < self.upload_attempts => {
                    tracing::warn!(
                        key = %key,
                        attempt = attempt,
                        max_attempts = self.upload_attempts,
                        error = %e,
                        "Upload attempt failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let created = Utc::now();
        let url = backend.sign(&key, self.url_ttl).await?;

        tracing::info!(key = %key, size = size, attempts = attempt, "Audio uploaded and URL signed");

        Ok(StoredAudioRef {
            url,
            expires_at: created + ttl_as_chrono(self.url_ttl),
            origin: StorageOrigin::Stored,
        })
    }

    fn placeholder(&self) -> StoredAudioRef {
        StoredAudioRef {
            url: format!("{}/audio-{}.wav", PLACEHOLDER_BASE_URL, Uuid::new_v4()),
            expires_at: Utc::now() + ttl_as_chrono(self.url_ttl),
            origin: StorageOrigin::Placeholder,
        }
    }
}

fn ttl_as_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
}
