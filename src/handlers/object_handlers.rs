//! Download endpoint behind the local backend's presigned URLs.
//! Streams object bodies to avoid buffering in memory.

use crate::{errors::AppError, services::storage::StorageError, state::ApiState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Query string appended by `LocalStore::presign_get`.
#[derive(Debug, Deserialize)]
pub struct SignedObjectQuery {
    pub expires: i64,
    pub signature: String,
}

/// `GET /objects/{bucket}/{*key}`: stream an object if its signature holds.
pub async fn get_signed_object(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedObjectQuery>,
) -> Result<Response, AppError> {
    let store = state
        .local_store
        .as_ref()
        .ok_or_else(|| AppError::not_found("Not Found"))?;

    store
        .verify_signature(&bucket, &key, q.expires, &q.signature, Utc::now())
        .map_err(|_| AppError::forbidden("Invalid or expired signature"))?;

    let (file, info) = store.open_object(&bucket, &key).await.map_err(|err| match err {
        StorageError::ObjectNotFound { .. } => AppError::not_found("Not Found"),
        other => AppError::from(other),
    })?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let content_type = info
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(info.size_bytes));

    Ok(response)
}
