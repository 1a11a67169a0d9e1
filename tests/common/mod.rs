#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use photo_stylizer::routes::TRANSFORM_PATH;
use serde_json::Value;

pub const BOUNDARY: &str = "----photo-stylizer-test-boundary";

/// Multipart body holding one file field.
pub fn file_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Multipart body holding one plain text field.
pub fn text_body(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"\r\n\r\n\
         {value}\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes()
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(TRANSFORM_PATH)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

pub fn photo_upload(file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    upload_request(file_body("image", file_name, content_type, data))
}

pub async fn read_json(response: Response) -> (StatusCode, HeaderMap, Value) {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

pub fn assert_cors(headers: &HeaderMap) {
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Authorization"
    );
}
