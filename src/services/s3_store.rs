//! [`ObjectStore`] backed by Amazon S3 or any S3-compatible service.

use crate::services::storage::{
    ObjectInfo, ObjectStore, PresignedUrl, StorageError, StorageResult,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    error::DisplayErrorContext, presigning::PresigningConfig, primitives::ByteStream,
};
use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`S3Store::connect`].
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services; enables path-style addressing.
    pub endpoint: Option<String>,
}

#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Build a client from explicit credentials.
    pub fn connect(settings: &S3Settings) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "photo-splitter-env",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()))
            .behavior_version_latest();

        if let Some(endpoint) = &settings.endpoint {
            // bucket as path segment instead of subdomain
            builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }

        Self::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }
}

fn backend_error(
    operation: &'static str,
    bucket: &str,
    key: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> StorageError {
    StorageError::Backend {
        operation,
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

fn not_found(bucket: &str, key: &str) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<ObjectInfo> {
        let size_bytes = body.len() as u64;
        debug!("uploading object: {} to bucket: {}", key, bucket);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| backend_error("put_object", bucket, key, err))?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes,
            content_type: Some(content_type.to_string()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        debug!("downloading object: {} from bucket: {}", key, bucket);

        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    not_found(bucket, key)
                } else {
                    backend_error("get_object", bucket, key, err)
                }
            })?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|err| backend_error("get_object", bucket, key, err))?;

        Ok(data.into_bytes())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    not_found(bucket, key)
                } else {
                    backend_error("head_object", bucket, key, err)
                }
            })?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: head.content_length().unwrap_or_default().max(0) as u64,
            content_type: head.content_type().map(str::to_string),
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedUrl> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| backend_error("presign", bucket, key, err))?;
        let issued_at = Utc::now();

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| backend_error("presign", bucket, key, err))?;

        let ttl = TimeDelta::from_std(expires_in)
            .map_err(|err| backend_error("presign", bucket, key, err))?;

        Ok(PresignedUrl {
            url: request.uri().to_string(),
            expires_at: issued_at + ttl,
        })
    }

    async fn check_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    StorageError::BucketNotFound(bucket.to_string())
                } else {
                    backend_error("head_bucket", bucket, "", err)
                }
            })?;
        Ok(())
    }
}
