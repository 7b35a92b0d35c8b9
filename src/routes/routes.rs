//! Defines routes for the two processes.
//!
//! ## API process
//! - `POST /api/upload-image`: store an original, return its presigned URL
//! - `POST /api/retrieve-manipulated-images`: presigned URLs of the variants
//! - `GET  /objects/{bucket}/{*key}`: signed downloads for the local backend
//!
//! ## Worker process
//! - `POST /events`: run the transform worker on a storage notification
//!
//! Both mount `GET /healthz` and `GET /readyz`.

use crate::{
    handlers::{
        event_handlers::handle_storage_event,
        health_handlers::{healthz, readyz},
        image_handlers::{retrieve_manipulated_images, upload_image},
        object_handlers::get_signed_object,
    },
    services::worker_service::WorkerService,
    state::ApiState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::CorsLayer,
    trace::{self, TraceLayer},
};
use tracing::Level;

/// Build the router of the upload/retrieve API.
///
/// `max_body_bytes` bounds JSON bodies, which carry base64 image payloads.
pub fn api_routes(state: ApiState, max_body_bytes: usize) -> Router {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<ApiState>))
        .route("/api/upload-image", post(upload_image))
        .route(
            "/api/retrieve-manipulated-images",
            post(retrieve_manipulated_images),
        )
        .route("/objects/{bucket}/{*key}", get(get_signed_object))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(trace_layer())
        .with_state(state)
}

/// Build the router of the transform worker.
pub fn worker_routes(worker: WorkerService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<WorkerService>))
        .route("/events", post(handle_storage_event))
        .layer(trace_layer())
        .with_state(worker)
}

fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
        .on_response(trace::DefaultOnResponse::new().level(Level::INFO))
}
