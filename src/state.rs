//! Shared handler state, built once at startup from [`AppConfig`].

use crate::{
    config::{AppConfig, BackendConfig},
    services::{
        local_store::LocalStore, s3_store::S3Store, storage::ObjectStore,
        upload_service::UploadService, worker_service::WorkerService,
    },
};
use std::sync::Arc;

/// The configured object store, plus the concrete local backend when it is
/// the one in use (the API serves its signed URLs).
#[derive(Clone)]
pub struct StoreHandle {
    pub store: Arc<dyn ObjectStore>,
    pub local: Option<Arc<LocalStore>>,
}

impl StoreHandle {
    pub fn from_config(cfg: &AppConfig) -> Self {
        match &cfg.backend {
            BackendConfig::S3(settings) => Self {
                store: Arc::new(S3Store::connect(settings)),
                local: None,
            },
            BackendConfig::Local {
                storage_dir,
                public_url,
                signing_secret,
            } => Self::local(LocalStore::new(
                storage_dir.clone(),
                public_url.clone(),
                signing_secret.clone(),
            )),
        }
    }

    pub fn local(store: LocalStore) -> Self {
        let local = Arc::new(store);
        Self {
            store: local.clone(),
            local: Some(local),
        }
    }
}

/// State of the upload/retrieve API.
#[derive(Clone)]
pub struct ApiState {
    pub uploads: UploadService,
    pub local_store: Option<Arc<LocalStore>>,
}

impl ApiState {
    pub fn new(handle: StoreHandle, source_bucket: &str, destination_bucket: &str) -> Self {
        Self {
            uploads: UploadService::new(handle.store, source_bucket, destination_bucket),
            local_store: handle.local,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            StoreHandle::from_config(cfg),
            &cfg.source_bucket,
            &cfg.destination_bucket,
        )
    }
}

/// Build the worker from configuration.
pub fn worker_from_config(cfg: &AppConfig) -> WorkerService {
    let handle = StoreHandle::from_config(cfg);
    WorkerService::new(handle.store, cfg.destination_bucket.clone(), cfg.sorted_hsv)
}
