//! Upload and retrieval operations behind the public API.

use crate::{
    models::variant::{self, VariantTag},
    services::storage::{ObjectStore, PRESIGNED_URL_TTL, PresignedUrl, StorageResult},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("filename `{0}` is not a valid object name")]
    InvalidFilename(String),
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Storage-facing half of the API. Originals go to the source bucket, which
/// the worker listens on; variants are read back from the destination bucket.
#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    source_bucket: String,
    destination_bucket: String,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        source_bucket: impl Into<String>,
        destination_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            source_bucket: source_bucket.into(),
            destination_bucket: destination_bucket.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn source_bucket(&self) -> &str {
        &self.source_bucket
    }

    pub fn destination_bucket(&self) -> &str {
        &self.destination_bucket
    }

    /// Store `data` as `original_<filename>` and return a read URL for it.
    pub async fn upload_image(&self, filename: &str, data: Bytes) -> StorageResult<PresignedUrl> {
        let key = variant::original_key(filename);
        let info = self
            .store
            .put_object(
                &self.source_bucket,
                &key,
                data,
                variant::content_type_for(filename),
            )
            .await?;

        info!(
            bucket = %self.source_bucket,
            key = %key,
            size = info.size_bytes,
            "stored original upload"
        );

        self.store
            .presign_get(&self.source_bucket, &key, PRESIGNED_URL_TTL)
            .await
    }

    /// Read URLs for the core variants of the upload named `filename`.
    ///
    /// Every variant must already exist; the first missing one fails the call.
    pub async fn retrieve_variants(
        &self,
        filename: &str,
    ) -> StorageResult<HashMap<VariantTag, PresignedUrl>> {
        let source_key = variant::original_key(filename);
        let mut urls = HashMap::with_capacity(VariantTag::CORE.len());

        for tag in VariantTag::CORE {
            let key = tag.key_for(&source_key);
            self.store
                .head_object(&self.destination_bucket, &key)
                .await?;
            let url = self
                .store
                .presign_get(&self.destination_bucket, &key, PRESIGNED_URL_TTL)
                .await?;
            urls.insert(tag, url);
        }

        Ok(urls)
    }
}

/// Pull a required, non-blank string out of an optional request field.
///
/// The value is returned exactly as sent; surrounding whitespace is part of
/// a filename and therefore of its key.
pub fn require_field<'a>(
    value: Option<&'a str>,
    name: &'static str,
) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(name)),
    }
}

/// Filenames become the tail of object keys and must stay a single segment.
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    let invalid = filename.contains('/')
        || filename.contains('\\')
        || filename == "."
        || filename == ".."
        || filename.chars().any(char::is_control);
    if invalid {
        return Err(ValidationError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Decode a base64 image payload, tolerating a `data:<mime>;base64,` prefix
/// and embedded whitespace.
pub fn decode_image_payload(payload: &str) -> Result<Bytes, ValidationError> {
    let encoded = match payload.split_once(',') {
        Some((header, rest)) if header.starts_with("data:") => rest,
        _ => payload,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    Ok(Bytes::from(bytes))
}
