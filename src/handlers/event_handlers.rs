//! Event endpoint of the transform worker process.

use crate::{
    errors::AppError,
    models::event::{InvocationResult, StorageEvent},
    services::worker_service::WorkerService,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// `POST /events`
///
/// Accepts a storage notification envelope and runs the worker on it. The
/// HTTP status mirrors the invocation's `statusCode`.
pub async fn handle_storage_event(
    State(worker): State<WorkerService>,
    payload: Result<Json<StorageEvent>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(event) = payload?;

    let result: InvocationResult = worker.handle_event(&event).await;
    let status =
        StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Ok((status, Json(result)))
}
