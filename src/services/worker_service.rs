//! The transform worker: turns one storage-creation event into the derived
//! variants of the created object.
//!
//! Every record is handled as a single unit. The source object is downloaded
//! and decoded once, then each variant is computed, JPEG-encoded and uploaded
//! in a fixed order. The first failure ends the invocation; variants already
//! written stay in place and nothing is retried.

use crate::{
    models::{
        event::{InvocationResult, StorageEvent, StorageEventRecord},
        variant::VariantTag,
    },
    services::{
        image_service::{self, ImageError},
        storage::ObjectStore,
    },
};
use anyhow::{Context, Result, bail};
use bytes::Bytes;
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Handle shared by every worker invocation.
#[derive(Clone)]
pub struct WorkerService {
    store: Arc<dyn ObjectStore>,
    destination_bucket: String,
    sorted_hsv: bool,
}

impl WorkerService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        destination_bucket: impl Into<String>,
        sorted_hsv: bool,
    ) -> Self {
        Self {
            store,
            destination_bucket: destination_bucket.into(),
            sorted_hsv,
        }
    }

    pub fn destination_bucket(&self) -> &str {
        &self.destination_bucket
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Tags this worker writes for each record, in upload order.
    pub fn tags(&self) -> Vec<VariantTag> {
        let mut tags = VariantTag::CORE.to_vec();
        if self.sorted_hsv {
            tags.extend(VariantTag::SORTED_HSV);
        }
        tags
    }

    /// Run one invocation and fold any error into a 500 result.
    pub async fn handle_event(&self, event: &StorageEvent) -> InvocationResult {
        match self.process_event(event).await {
            Ok(()) => InvocationResult::success(),
            Err(err) => {
                error!("Error processing request: {:#}", err);
                InvocationResult::failure(&err)
            }
        }
    }

    /// Process every record of the envelope, one after another.
    pub async fn process_event(&self, event: &StorageEvent) -> Result<()> {
        if event.records.is_empty() {
            bail!("event contains no records");
        }

        for record in &event.records {
            if !record.is_object_created() {
                info!(
                    event = record.event_name.as_deref().unwrap_or_default(),
                    bucket = %record.bucket(),
                    "skipping non-creation record"
                );
                continue;
            }
            self.process_record(record).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(bucket = %record.bucket(), key = %record.object_key()))]
    pub async fn process_record(&self, record: &StorageEventRecord) -> Result<()> {
        let source_bucket = record.bucket();
        let object_key = record.object_key();

        let data = self
            .store
            .get_object(source_bucket, &object_key)
            .await
            .with_context(|| format!("downloading {source_bucket}/{object_key}"))?;

        let tags = self.tags();
        let variants = tokio::task::spawn_blocking(move || render_variants(&data, &tags))
            .await
            .context("image transform task panicked")??;

        for (tag, encoded) in variants {
            self.upload_processed_image(&object_key, tag, encoded).await?;
        }

        info!("processed {} variants", self.tags().len());
        Ok(())
    }

    /// Store one encoded variant under `<tag>/<object_key>` in the destination bucket.
    pub async fn upload_processed_image(
        &self,
        object_key: &str,
        tag: VariantTag,
        encoded: Vec<u8>,
    ) -> Result<()> {
        let key = tag.key_for(object_key);
        self.store
            .put_object(
                &self.destination_bucket,
                &key,
                Bytes::from(encoded),
                "image/jpeg",
            )
            .await
            .with_context(|| format!("uploading {tag} variant to {}", key))?;
        Ok(())
    }
}

/// Decode `data` and produce the JPEG bytes of each requested variant.
///
/// Encoding happens before any upload starts, so a record whose source cannot
/// be decoded or encoded writes nothing.
fn render_variants(
    data: &[u8],
    tags: &[VariantTag],
) -> Result<Vec<(VariantTag, Vec<u8>)>, ImageError> {
    let source = image_service::decode_rgb(data)?;
    let (red, green, blue) = image_service::create_channel_images(&source);
    let mut rendered = vec![
        (VariantTag::Red, DynamicImage::ImageRgb8(red)),
        (VariantTag::Green, DynamicImage::ImageRgb8(green)),
        (VariantTag::Blue, DynamicImage::ImageRgb8(blue)),
        (
            VariantTag::Bw,
            DynamicImage::ImageLuma8(image_service::create_bw_image(&source)),
        ),
        (
            VariantTag::Inverted,
            DynamicImage::ImageRgb8(image_service::create_inverted_image(&source)),
        ),
    ];

    if tags.iter().any(|t| VariantTag::SORTED_HSV.contains(t)) {
        rendered.extend(sorted_hsv_variants(&source));
    }

    rendered
        .into_iter()
        .filter(|(tag, _)| tags.contains(tag))
        .map(|(tag, img)| image_service::encode_jpeg(img).map(|bytes| (tag, bytes)))
        .collect()
}

fn sorted_hsv_variants(source: &RgbImage) -> [(VariantTag, DynamicImage); 3] {
    let (hue, saturation, brightness) = image_service::create_sorted_hsv_images(source);
    [
        (VariantTag::SortedHue, DynamicImage::ImageLuma8(hue)),
        (VariantTag::SortedSaturation, DynamicImage::ImageLuma8(saturation)),
        (VariantTag::SortedBrightness, DynamicImage::ImageLuma8(brightness)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{S3Bucket, S3Entity, S3Object};
    use crate::services::local_store::LocalStore;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;
    use url::Url;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 200]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn record(bucket: &str, key: &str) -> StorageEventRecord {
        StorageEventRecord {
            event_name: Some("ObjectCreated:Put".into()),
            s3: S3Entity {
                bucket: S3Bucket { name: bucket.into() },
                object: S3Object { key: key.into() },
            },
        }
    }

    fn worker(dir: &std::path::Path, sorted_hsv: bool) -> (WorkerService, Arc<dyn ObjectStore>) {
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(
            dir,
            Url::parse("http://localhost:3000").unwrap(),
            "secret",
        ));
        (WorkerService::new(store.clone(), "outputs", sorted_hsv), store)
    }

    #[tokio::test]
    async fn writes_every_core_variant() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, store) = worker(dir.path(), false);
        store
            .put_object("uploads", "cat.png", Bytes::from(png_bytes()), "image/png")
            .await
            .unwrap();

        let event = StorageEvent {
            records: vec![record("uploads", "cat.png")],
        };
        let result = worker.handle_event(&event).await;
        assert_eq!(result, InvocationResult::success());

        for key in [
            "red/cat.png",
            "green/cat.png",
            "blue/cat.png",
            "bw/cat.png",
            "inverted/cat.png",
        ] {
            let bytes = store.get_object("outputs", key).await.unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (8, 6), "{key}");
        }

        let bw = image::load_from_memory(&store.get_object("outputs", "bw/cat.png").await.unwrap())
            .unwrap();
        assert_eq!(bw.color(), image::ColorType::L8);
        assert!(store.head_object("outputs", "sortedHue/cat.png").await.is_err());
    }

    #[tokio::test]
    async fn sorted_hsv_variants_are_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, store) = worker(dir.path(), true);
        store
            .put_object("uploads", "cat.png", Bytes::from(png_bytes()), "image/png")
            .await
            .unwrap();

        worker
            .process_record(&record("uploads", "cat.png"))
            .await
            .unwrap();

        for key in ["sortedHue/cat.png", "sortedSaturation/cat.png", "sortedBrightness/cat.png"] {
            store.head_object("outputs", key).await.unwrap();
        }
    }

    #[tokio::test]
    async fn decodes_encoded_event_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, store) = worker(dir.path(), false);
        store
            .put_object("uploads", "original_my cat.png", Bytes::from(png_bytes()), "image/png")
            .await
            .unwrap();

        worker
            .process_record(&record("uploads", "original_my+cat.png"))
            .await
            .unwrap();
        store
            .head_object("outputs", "red/original_my cat.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_source_fails_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, _store) = worker(dir.path(), false);

        let event = StorageEvent {
            records: vec![record("uploads", "ghost.png")],
        };
        let result = worker.handle_event(&event).await;
        assert_eq!(result.status_code, 500);
        assert!(result.body.starts_with("Error processing request: downloading uploads/ghost.png"));
    }

    #[tokio::test]
    async fn undecodable_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, store) = worker(dir.path(), false);
        store
            .put_object("uploads", "notes.png", Bytes::from_static(b"plain text"), "image/png")
            .await
            .unwrap();

        let err = worker
            .process_record(&record("uploads", "notes.png"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ImageError>().is_some());
        assert!(store.head_object("outputs", "red/notes.png").await.is_err());
    }

    #[tokio::test]
    async fn removal_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, store) = worker(dir.path(), false);

        let mut removed = record("uploads", "gone.png");
        removed.event_name = Some("ObjectRemoved:Delete".into());
        let result = worker
            .handle_event(&StorageEvent {
                records: vec![removed],
            })
            .await;
        assert_eq!(result, InvocationResult::success());
        assert!(store.head_object("outputs", "red/gone.png").await.is_err());
    }

    #[tokio::test]
    async fn empty_envelope_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, _store) = worker(dir.path(), false);

        let result = worker.handle_event(&StorageEvent { records: vec![] }).await;
        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, "Error processing request: event contains no records");
    }
}
