#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use base64::{Engine as _, engine::general_purpose};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photo_splitter::{
    routes::routes::{api_routes, worker_routes},
    services::{local_store::LocalStore, worker_service::WorkerService},
    state::{ApiState, StoreHandle},
};
use std::io::Cursor;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

pub const SOURCE_BUCKET: &str = "photo-uploads";
pub const DESTINATION_BUCKET: &str = "photo-splitter";

pub struct TestApp {
    pub api: Router,
    pub worker: Router,
    pub handle: StoreHandle,
    _dir: TempDir,
}

pub fn bootstrap() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(
        dir.path(),
        Url::parse("http://127.0.0.1:3000/").unwrap(),
        "integration-secret",
    );
    let handle = StoreHandle::local(store);

    let api_state = ApiState::new(handle.clone(), SOURCE_BUCKET, DESTINATION_BUCKET);
    let worker = WorkerService::new(handle.store.clone(), DESTINATION_BUCKET, false);

    TestApp {
        api: api_routes(api_state, 10 * 1024 * 1024),
        worker: worker_routes(worker),
        handle,
        _dir: dir,
    }
}

pub fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(16, 12, |x, y| {
        Rgb([(x * 16) as u8, (y * 20) as u8, ((x + y) * 8) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn base64(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

pub async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(router, uri, &body.to_string()).await
}

pub async fn post_raw(router: &Router, uri: &str, body: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Request the path and query of an absolute URL handed out by the API.
pub async fn follow(router: &Router, absolute: &str) -> Response<Body> {
    let url = Url::parse(absolute).unwrap();
    let path_and_query = match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    };
    get(router, &path_and_query).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn creation_event(bucket: &str, key: &str) -> serde_json::Value {
    serde_json::json!({
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": bucket },
                "object": { "key": key, "size": 1 }
            }
        }]
    })
}
