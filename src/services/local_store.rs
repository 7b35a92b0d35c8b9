//! Filesystem-backed [`ObjectStore`] for development and tests.
//!
//! Payloads live beneath `root/{bucket}/{shard}/{shard}/{key}` where the two
//! shard levels come from MD5(bucket/key). Writes go to a temporary file that
//! is renamed into place, so readers never observe a partial object.
//!
//! Presigned URLs point at the API's `/objects/{bucket}/{*key}` route and
//! carry an expiry timestamp plus an HMAC-SHA256 signature over
//! `bucket\nkey\nexpires`.

use crate::models::variant::content_type_for;
use crate::services::storage::{
    ObjectInfo, ObjectStore, PresignedUrl, StorageError, StorageResult, ensure_bucket_name_safe,
    ensure_key_safe,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{
    io::{self, ErrorKind, SeekFrom},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;
use url::Url;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Route prefix the API mounts the signed-object handler under.
pub const OBJECTS_ROUTE_PREFIX: &str = "objects";

#[derive(Clone)]
pub struct LocalStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,
    /// Public URL of the API process, used as the root of presigned URLs.
    public_url: Url,
    signing_secret: String,
}

impl LocalStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_url: Url,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            public_url,
            signing_secret: signing_secret.into(),
        }
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Two-level shard directories derived from MD5(bucket/key).
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Physical path of an object payload. Parent directories may not exist.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.bucket_root(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn validate(bucket: &str, key: &str) -> StorageResult<()> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)
    }

    fn signature(&self, bucket: &str, key: &str, expires: i64) -> StorageResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|_| StorageError::InvalidSignature)?;
        mac.update(format!("{bucket}\n{key}\n{expires}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a signature produced by [`ObjectStore::presign_get`].
    ///
    /// Fails with `InvalidSignature` when the signature does not match or the
    /// link expired before `now`.
    pub fn verify_signature(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        if now.timestamp() > expires {
            return Err(StorageError::InvalidSignature);
        }

        let provided = hex::decode(signature).map_err(|_| StorageError::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|_| StorageError::InvalidSignature)?;
        mac.update(format!("{bucket}\n{key}\n{expires}").as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| StorageError::InvalidSignature)
    }

    /// Open an object for streaming.
    ///
    /// The content type is sniffed from the leading bytes, falling back to
    /// the key's extension; the handle is rewound before it is returned.
    pub async fn open_object(&self, bucket: &str, key: &str) -> StorageResult<(File, ObjectInfo)> {
        Self::validate(bucket, key)?;
        let path = self.object_path(bucket, key);
        let mut file = File::open(&path)
            .await
            .map_err(|err| not_found_or_io(err, bucket, key))?;
        let size_bytes = file.metadata().await?.len();

        let mut head = [0u8; 16];
        let read = file.read(&mut head).await?;
        file.seek(SeekFrom::Start(0)).await?;
        let content_type = image::guess_format(&head[..read])
            .map(|format| format.to_mime_type())
            .unwrap_or_else(|_| content_type_for(key));

        Ok((
            file,
            ObjectInfo {
                key: key.to_string(),
                size_bytes,
                content_type: Some(content_type.to_string()),
            },
        ))
    }

    fn presigned_url(&self, bucket: &str, key: &str, expires: i64) -> StorageResult<Url> {
        let signature = self.signature(bucket, key, expires)?;
        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Backend {
                operation: "presign",
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "public url cannot be a base".into(),
            })?
            .pop_if_empty()
            .push(OBJECTS_ROUTE_PREFIX)
            .push(bucket)
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<ObjectInfo> {
        Self::validate(bucket, key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = write_file(&tmp_path, &body).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!(bucket, key, size = body.len(), "stored object {}", file_path.display());

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: body.len() as u64,
            content_type: Some(content_type.to_string()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        Self::validate(bucket, key)?;
        let data = fs::read(self.object_path(bucket, key))
            .await
            .map_err(|err| not_found_or_io(err, bucket, key))?;
        Ok(Bytes::from(data))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectInfo> {
        Self::validate(bucket, key)?;
        let meta = fs::metadata(self.object_path(bucket, key))
            .await
            .map_err(|err| not_found_or_io(err, bucket, key))?;
        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: meta.len(),
            content_type: None,
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedUrl> {
        Self::validate(bucket, key)?;
        let ttl = TimeDelta::from_std(expires_in).map_err(|err| StorageError::Backend {
            operation: "presign",
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        })?;
        let expires_at = Utc::now() + ttl;
        let url = self.presigned_url(bucket, key, expires_at.timestamp())?;

        Ok(PresignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }

    /// Creates the bucket directory on first use, then performs a
    /// write/read/delete round trip inside it.
    async fn check_bucket(&self, bucket: &str) -> StorageResult<()> {
        ensure_bucket_name_safe(bucket)?;
        let root = self.bucket_root(bucket);
        fs::create_dir_all(&root).await?;

        let probe = root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;

        if read_back? != b"readyz" {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }
}

async fn write_file(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await
}

fn not_found_or_io(err: io::Error, bucket: &str, key: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        StorageError::Io(err)
    }
}
