//! The object-store seam shared by the API and the worker.
//!
//! Both processes talk to storage only through [`ObjectStore`], so the same
//! handlers run against S3 in production and against the local filesystem
//! backend in development and tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{io, time::Duration};
use thiserror::Error;

/// Validity window of every URL handed out to clients.
pub const PRESIGNED_URL_TTL: Duration = Duration::from_secs(3600);

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("presigned url is invalid or expired")]
    InvalidSignature,
    #[error("{operation} failed for `{bucket}/{key}`: {message}")]
    Backend {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

/// A time-limited read URL for one object.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Flat key/value blob storage with presigned reads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name used in logs and readiness output.
    fn name(&self) -> &'static str;

    /// Write `body` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<ObjectInfo>;

    /// Read the full body of an object.
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Fetch metadata only; fails with `ObjectNotFound` when absent.
    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo>;

    /// Issue a URL granting read access to one object for `expires_in`.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedUrl>;

    /// Verify the bucket is reachable. Used by readiness probes.
    async fn check_bucket(&self, bucket: &str) -> StorageResult<()>;
}

/// Reject keys that are empty, oversized, absolute, or traverse upwards.
pub fn ensure_key_safe(key: &str) -> StorageResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.split('/').any(|segment| segment == "..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');

    if invalid {
        return Err(StorageError::InvalidObjectKey(key.to_string()));
    }
    Ok(())
}

/// Validate bucket names against the usual S3 naming rules.
pub fn ensure_bucket_name_safe(name: &str) -> StorageResult<()> {
    let fail = |reason: &str| {
        Err(StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        })
    };

    if name.len() < BUCKET_NAME_MIN_LEN || name.len() > BUCKET_NAME_MAX_LEN {
        return fail("must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return fail("allowed characters are lowercase letters, digits, dots, and hyphens");
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return fail("must start and end with a lowercase letter or digit");
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return fail("cannot contain consecutive dots or dot-hyphen combinations");
    }
    Ok(())
}
