//! HTTP handlers of the upload/retrieve API.
//!
//! Both endpoints answer `{"error": ..}` with a 500 on any failure, whatever
//! its cause; the cause itself is only logged.

use crate::{
    errors::{AppError, GENERIC_ERROR},
    models::{
        api::{RetrieveImagesRequest, RetrieveImagesResponse, UploadImageRequest, UploadImageResponse},
        variant::VariantTag,
    },
    services::upload_service::{decode_image_payload, require_field, validate_filename},
    state::ApiState,
};
use axum::{Json, extract::State, extract::rejection::JsonRejection};

/// `POST /api/upload-image`
pub async fn upload_image(
    State(state): State<ApiState>,
    payload: Result<Json<UploadImageRequest>, JsonRejection>,
) -> Result<Json<UploadImageResponse>, AppError> {
    let Json(req) = payload?;

    let filename = require_field(req.filename.as_deref(), "filename")?;
    validate_filename(filename)?;
    let image = require_field(req.image.as_deref(), "image")?;
    let data = decode_image_payload(image)?;

    let url = state
        .uploads
        .upload_image(filename, data)
        .await
        .map_err(|err| AppError::logged("Failed to upload image", err))?;

    Ok(Json(UploadImageResponse { original: url.url }))
}

/// `POST /api/retrieve-manipulated-images`
pub async fn retrieve_manipulated_images(
    State(state): State<ApiState>,
    payload: Result<Json<RetrieveImagesRequest>, JsonRejection>,
) -> Result<Json<RetrieveImagesResponse>, AppError> {
    let Json(req) = payload?;

    let filename = require_field(req.filename.as_deref(), "filename")?;
    validate_filename(filename)?;

    let mut urls = state.uploads.retrieve_variants(filename).await?;
    let mut take = |tag: VariantTag| {
        urls.remove(&tag)
            .map(|presigned| presigned.url)
            .ok_or_else(|| AppError::logged(GENERIC_ERROR, format!("no url for {tag}")))
    };

    let blue = take(VariantTag::Blue)?;
    Ok(Json(RetrieveImagesResponse {
        red: take(VariantTag::Red)?,
        green: take(VariantTag::Green)?,
        blue_url: blue.clone(),
        blue,
        bw: take(VariantTag::Bw)?,
        inverted: take(VariantTag::Inverted)?,
    }))
}
