use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Lifetime of every presigned URL handed to clients.
pub const PRESIGNED_URL_TTL: Duration = Duration::from_secs(600);

/// StorageError
///
/// Failures talking to the object store. Always surfaced to clients as internal errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid presigning configuration: {0}")]
    Presigning(String),

    #[error("object storage request failed: {0}")]
    Request(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Defines the abstract contract for all interactions with the object storage layer.
/// Handlers only see this trait, so the S3 client can be replaced by
/// `MockStorageService` in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Called at startup in `Env::Local`
    /// to provision the MinIO bucket.
    async fn ensure_bucket_exists(&self);

    /// Generates a temporary signed URL allowing a client to upload an object
    /// directly to the bucket. The upload must carry `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Generates a temporary signed URL for downloading an object.
    async fn get_presigned_download_url(&self, key: &str) -> Result<String, StorageError>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// The concrete implementation using the AWS SDK for S3. Path-style addressing
/// keeps it compatible with MinIO and other S3-compatible gateways.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// new
    ///
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is required by MinIO.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }

    fn presigning() -> Result<PresigningConfig, StorageError> {
        PresigningConfig::expires_in(PRESIGNED_URL_TTL)
            .map_err(|e| StorageError::Presigning(e.to_string()))
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// CreateBucket is idempotent; an "already owned" failure is expected on restarts.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            // The client's upload must send this exact Content-Type.
            .content_type(content_type)
            .presigned(Self::presigning()?)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }

    async fn get_presigned_download_url(&self, key: &str) -> Result<String, StorageError> {
        let presigned_req = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .presigned(Self::presigning()?)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(())
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) and empty segments from
/// an object key so a crafted file name cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in for `StorageService`. Returns deterministic URLs and
/// records deleted keys so tests can assert on cascades.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    deleted: Arc<Mutex<BTreeSet<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys passed to `delete_object` so far.
    pub fn deleted_keys(&self) -> Vec<String> {
        match self.deleted.lock() {
            Ok(deleted) => deleted.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.should_fail {
            Err(StorageError::Request(
                "mock storage error: simulation requested".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.check()?;
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake&method=PUT",
            sanitize_key(key)
        ))
    }

    async fn get_presigned_download_url(&self, key: &str) -> Result<String, StorageError> {
        self.check()?;
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake&method=GET",
            sanitize_key(key)
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        let key = sanitize_key(key);
        match self.deleted.lock() {
            Ok(mut deleted) => deleted.insert(key),
            Err(poisoned) => poisoned.into_inner().insert(key),
        };
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
