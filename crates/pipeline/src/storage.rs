//! Image storage collaborator.
//!
//! The pipeline only ever needs one operation from object storage:
//! fetch the uploaded image bytes plus their MIME type. [`ImageStore`]
//! is that seam; production uses [`S3ImageStore`], development and
//! tests use [`LocalImageStore`] or scripted fakes.

use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;

use cardex_core::retry::Retryable;
use cardex_vision::ImagePayload;

/// MIME type used when the stored object does not declare one.
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Errors from the image storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The object does not exist (bad path or deleted upload).
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A transport or service fault worth retrying.
    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl Retryable for StorageError {
    fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}

/// Fetches uploaded image bytes for the pipeline.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Download an object's bytes and MIME type.
    async fn download(&self, path: &str) -> Result<ImagePayload, StorageError>;
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// S3-backed image store.
pub struct S3ImageStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ImageStore {
    /// Build a store from the ambient AWS environment configuration.
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket,
        }
    }

    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn download(&self, path: &str) -> Result<ImagePayload, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(ctx) if ctx.err().is_no_such_key() => {
                    StorageError::NotFound(path.to_string())
                }
                _ => StorageError::Io(e.to_string()),
            })?;

        let mime_type = response
            .content_type()
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?
            .into_bytes()
            .to_vec();

        tracing::debug!(path, bytes = bytes.len(), mime_type = %mime_type, "Image downloaded");
        Ok(ImagePayload { bytes, mime_type })
    }
}

// ---------------------------------------------------------------------------
// Local filesystem
// ---------------------------------------------------------------------------

/// Filesystem-backed image store for development and tests.
///
/// The MIME type is sniffed from the file's magic bytes since the
/// filesystem keeps none.
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn download(&self, path: &str) -> Result<ImagePayload, StorageError> {
        let full_path = self.root.join(path);
        let bytes = tokio::fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Io(e.to_string())
            }
        })?;

        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| FALLBACK_MIME_TYPE.to_string());

        Ok(ImagePayload { bytes, mime_type })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
