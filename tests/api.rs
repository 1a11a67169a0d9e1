mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SubsecRound, Utc};
use tower::ServiceExt;

use photo_stylizer::mock::{FailingAnalyzer, FailingGenerator, StaticAnalyzer, StaticGenerator};
use photo_stylizer::routes::{MAX_REQUEST_BODY_BYTES, TRANSFORM_PATH};
use photo_stylizer::transform::ImageGenerator;
use photo_stylizer::{router, AppState, Transformer};

use common::{assert_cors, photo_upload, read_json, text_body, upload_request};

// -- Helpers --------------------------------------------------------------

fn failing_generators() -> (Arc<FailingGenerator>, Arc<FailingGenerator>) {
    (
        Arc::new(FailingGenerator::new("imagen")),
        Arc::new(FailingGenerator::new("gemini-image")),
    )
}

fn state_with(
    analyzer: Arc<dyn photo_stylizer::transform::ImageAnalyzer>,
    generators: Vec<Arc<dyn ImageGenerator>>,
) -> AppState {
    AppState::new(Transformer::new(analyzer, generators))
}

fn jpeg(len: usize) -> Vec<u8> {
    let mut data = vec![0xff, 0xd8, 0xff, 0xe0];
    data.resize(len, 0x42);
    data
}

// -- Discovery and preflight ----------------------------------------------

#[tokio::test]
async fn get_returns_capability_descriptor() {
    let app = router(AppState::unconfigured());
    let request = Request::builder()
        .uri(TRANSFORM_PATH)
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = read_json(app.oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(
        body["supportedFormats"],
        serde_json::json!(["image/jpeg", "image/png", "image/webp"])
    );
    assert_eq!(body["maxFileSize"], "10MB");
    assert!(body["message"].is_string());
    assert_cors(&headers);
}

#[tokio::test]
async fn options_is_an_empty_no_op() {
    let app = router(AppState::unconfigured());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(TRANSFORM_PATH)
        .header("origin", "https://example.com")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = read_json(app.oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
    assert_cors(&headers);
}

#[tokio::test]
async fn unknown_path_and_wrong_method_carry_cors_headers() {
    let app = router(AppState::unconfigured());

    let not_found = Request::builder()
        .uri("/nope")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(not_found).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(response.headers());

    let wrong_method = Request::builder()
        .method(Method::PUT)
        .uri(TRANSFORM_PATH)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(wrong_method).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_cors(response.headers());
}

// -- Validation -----------------------------------------------------------

#[tokio::test]
async fn missing_image_field_is_rejected() {
    let analyzer = Arc::new(StaticAnalyzer::new("unused"));
    let app = router(state_with(analyzer.clone(), Vec::new()));

    let response = app
        .oneshot(upload_request(text_body("note", "hello")))
        .await
        .unwrap();
    let (status, headers, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No image file provided");
    assert_eq!(analyzer.calls(), 0);
    assert_cors(&headers);
}

#[tokio::test]
async fn non_multipart_body_has_no_image() {
    let analyzer = Arc::new(StaticAnalyzer::new("unused"));
    let app = router(state_with(analyzer.clone(), Vec::new()));
    let request = Request::builder()
        .method(Method::POST)
        .uri(TRANSFORM_PATH)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"image":"nope"}"#))
        .unwrap();

    let (status, _, body) = read_json(app.oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file provided");
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn text_file_renamed_to_jpg_is_rejected() {
    let analyzer = Arc::new(StaticAnalyzer::new("unused"));
    let app = router(state_with(analyzer.clone(), Vec::new()));

    let response = app
        .oneshot(photo_upload("photo.jpg", "text/plain", &[b'a'; 50]))
        .await
        .unwrap();
    let (status, _, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File must be an image");
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn oversized_png_is_rejected_before_analysis() {
    let analyzer = Arc::new(StaticAnalyzer::new("unused"));
    let app = router(state_with(analyzer.clone(), Vec::new()));

    let response = app
        .oneshot(photo_upload(
            "huge.png",
            "image/png",
            &vec![0u8; 11 * 1024 * 1024],
        ))
        .await
        .unwrap();
    let (status, _, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File size must be less than 10MB");
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn upload_beyond_body_limit_is_too_large() {
    let analyzer = Arc::new(StaticAnalyzer::new("unused"));
    let app = router(state_with(analyzer.clone(), Vec::new()));

    let response = app
        .oneshot(photo_upload(
            "enormous.png",
            "image/png",
            &vec![0u8; MAX_REQUEST_BODY_BYTES + 1024 * 1024],
        ))
        .await
        .unwrap();
    let (status, headers, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "File size must be less than 10MB");
    assert_eq!(analyzer.calls(), 0);
    assert_cors(&headers);
}

#[tokio::test]
async fn validation_runs_even_without_api_key() {
    let app = router(AppState::unconfigured());

    let response = app
        .oneshot(photo_upload("notes.txt", "text/plain", b"hello"))
        .await
        .unwrap();
    let (status, _, _) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Service errors -------------------------------------------------------

#[tokio::test]
async fn missing_api_key_is_a_configuration_error() {
    let app = router(AppState::unconfigured());

    let response = app
        .oneshot(photo_upload("photo.jpg", "image/jpeg", &jpeg(2048)))
        .await
        .unwrap();
    let (status, headers, body) = read_json(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "GEMINI_API_KEY environment variable is not set"
    );
    assert_cors(&headers);
}

#[tokio::test]
async fn analysis_failure_returns_500_without_generating() {
    let analyzer = Arc::new(FailingAnalyzer::new("model overloaded"));
    let (first, second) = failing_generators();
    let app = router(state_with(
        analyzer.clone(),
        vec![first.clone(), second.clone()],
    ));

    let response = app
        .oneshot(photo_upload("photo.jpg", "image/jpeg", &jpeg(2048)))
        .await
        .unwrap();
    let (status, _, body) = read_json(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to analyze image"));
    assert!(message.contains("model overloaded"));
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(first.calls(), 0);
    assert_eq!(second.calls(), 0);
}

// -- Successful transforms ------------------------------------------------

#[tokio::test]
async fn failed_generation_falls_back_to_description() {
    let before = Utc::now().trunc_subsecs(3);
    let analyzer = Arc::new(StaticAnalyzer::new("a person standing outdoors"));
    let (first, second) = failing_generators();
    let app = router(state_with(
        analyzer.clone(),
        vec![first.clone(), second.clone()],
    ));

    let response = app
        .oneshot(photo_upload("photo.jpg", "image/jpeg", &jpeg(2048)))
        .await
        .unwrap();
    let (status, headers, body) = read_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["description"]
        .as_str()
        .unwrap()
        .contains("a person standing outdoors"));
    assert!(body.get("imageBase64").is_none());
    assert_eq!(body["originalFileName"], "photo.jpg");

    let processed_at = DateTime::parse_from_rfc3339(body["processedAt"].as_str().unwrap())
        .unwrap()
        .with_timezone(&Utc);
    assert!(processed_at >= before);

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_cors(&headers);
}

#[tokio::test]
async fn generated_image_is_returned_byte_for_byte() {
    let generated: Vec<u8> = (0..=255).collect();
    let analyzer = Arc::new(StaticAnalyzer::new("a skyline at dusk"));
    let first = Arc::new(FailingGenerator::new("imagen"));
    let second = Arc::new(StaticGenerator::new(
        "gemini-image",
        generated.clone(),
        "image/png",
    ));
    let app = router(state_with(
        analyzer,
        vec![first.clone(), second.clone()],
    ));

    let response = app
        .oneshot(photo_upload("city.png", "image/png", &[1, 2, 3, 4]))
        .await
        .unwrap();
    let (status, _, body) = read_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let decoded = general_purpose::STANDARD
        .decode(body["imageBase64"].as_str().unwrap())
        .unwrap();
    assert_eq!(decoded, generated);
    assert_eq!(body["mimeType"], "image/png");
    assert!(body.get("description").is_none());
    assert_eq!(body["originalFileName"], "city.png");
    assert!(second
        .last_prompt()
        .unwrap()
        .contains("a skyline at dusk"));
}

#[tokio::test]
async fn other_form_fields_are_ignored() {
    let analyzer = Arc::new(StaticAnalyzer::new("a bowl of fruit"));
    let app = router(state_with(analyzer.clone(), Vec::new()));

    let mut body = text_body("note", "first");
    // Drop the closing delimiter of the first body and append the file part.
    body.truncate(body.len() - (common::BOUNDARY.len() + 6));
    body.extend(common::file_body("image", "fruit.webp", "image/webp", &[7; 64]));

    let (status, _, json) = read_json(app.oneshot(upload_request(body)).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["originalFileName"], "fruit.webp");
    assert_eq!(analyzer.calls(), 1);
}
