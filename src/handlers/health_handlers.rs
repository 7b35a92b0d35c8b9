//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks every bucket the process touches

use crate::{
    services::{storage::ObjectStore, worker_service::WorkerService},
    state::ApiState,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

/// State that can report which store and buckets it depends on.
pub trait ReadinessProbe: Clone + Send + Sync + 'static {
    fn store(&self) -> &Arc<dyn ObjectStore>;
    fn buckets(&self) -> Vec<String>;
}

impl ReadinessProbe for ApiState {
    fn store(&self) -> &Arc<dyn ObjectStore> {
        self.uploads.store()
    }

    fn buckets(&self) -> Vec<String> {
        vec![
            self.uploads.source_bucket().to_string(),
            self.uploads.destination_bucket().to_string(),
        ]
    }
}

impl ReadinessProbe for WorkerService {
    fn store(&self) -> &Arc<dyn ObjectStore> {
        WorkerService::store(self)
    }

    fn buckets(&self) -> Vec<String> {
        vec![self.destination_bucket().to_string()]
    }
}

/// `GET /healthz`
///
/// Liveness probe. Always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Probes each bucket through the configured store. HTTP 200 when all checks
/// pass, HTTP 503 when any check fails.
pub async fn readyz<S: ReadinessProbe>(State(state): State<S>) -> impl IntoResponse {
    let store = state.store();
    let mut checks = BTreeMap::new();

    for bucket in state.buckets() {
        let status = match store.check_bucket(&bucket).await {
            Ok(()) => CheckStatus {
                ok: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!("readiness check failed for bucket {}: {}", bucket, e);
                CheckStatus {
                    ok: false,
                    error: Some(e.to_string()),
                }
            }
        };
        checks.insert(bucket, status);
    }

    let overall_ok = checks.values().all(|c| c.ok);
    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        backend: store.name(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    backend: &'static str,
    checks: BTreeMap<String, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
