//! Request and response bodies of the upload/retrieve API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/upload-image`.
///
/// Fields are optional so that a missing value surfaces as a validation
/// error from the handler rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct UploadImageRequest {
    /// Base64 image payload, optionally as a `data:` URL.
    pub image: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadImageResponse {
    /// Presigned URL of the stored original.
    pub original: String,
}

/// Body of `POST /api/retrieve-manipulated-images`.
#[derive(Debug, Default, Deserialize)]
pub struct RetrieveImagesRequest {
    pub filename: Option<String>,
}

/// Presigned URLs of every core variant of one upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveImagesResponse {
    pub red: String,
    pub green: String,
    pub blue: String,
    /// Same URL as `blue`; older clients read the blue variant under this name.
    pub blue_url: String,
    pub bw: String,
    pub inverted: String,
}
