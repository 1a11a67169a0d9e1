use std::any::Any;
use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{TransformError, UpstreamError};
use crate::gemini::GeminiClient;
use crate::transform::{TransformationResult, Transformer};
use crate::validation::{self, UploadedImage, SUPPORTED_FORMATS};

pub const TRANSFORM_PATH: &str = "/api/transform";
pub const IMAGE_FIELD: &str = "image";

/// Large enough that oversized photos still reach validation and get a
/// readable error instead of a truncated stream.
pub const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone, Debug, Default)]
pub struct AppState {
    transformer: Option<Arc<Transformer>>,
}

impl AppState {
    pub fn new(transformer: Transformer) -> Self {
        Self {
            transformer: Some(Arc::new(transformer)),
        }
    }

    /// State for a process started without an API key.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let Some(api_key) = config.api_key() else {
            warn!("GEMINI_API_KEY is not set; transform requests will fail until it is");
            return Ok(Self::unconfigured());
        };

        let client = GeminiClient::new(api_key, &config.base_url, config.upstream_timeout())?;
        Ok(Self::new(Transformer::with_gemini(Arc::new(client), config)))
    }

    pub fn is_configured(&self) -> bool {
        self.transformer.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct TransformResponse {
    success: bool,
    #[serde(flatten)]
    result: TransformationResult,
}

impl From<TransformationResult> for TransformResponse {
    fn from(result: TransformationResult) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

pub fn router(state: AppState) -> Router {
    with_middleware(Router::new().route(
        TRANSFORM_PATH,
        get(capabilities).post(transform).options(preflight),
    ))
    .with_state(state)
}

/// Body limit, panic recovery, CORS headers and request tracing, applied to
/// every route and to the 404/405 fallbacks.
pub fn with_middleware<S>(routes: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let cors = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ));

    routes
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "Internal server error".to_owned()
    };

    TransformError::Unexpected(message).into_response()
}

async fn capabilities() -> Json<Value> {
    Json(json!({
        "message": "Photo Stylizer API",
        "status": "active",
        "supportedFormats": SUPPORTED_FORMATS,
        "maxFileSize": "10MB",
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn transform(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TransformResponse>, TransformError> {
    let candidate = match multipart {
        Ok(multipart) => read_image_field(multipart).await?,
        Err(rejection) => {
            debug!(%rejection, "request body is not multipart");
            None
        }
    };

    let image = validation::validate(candidate)?;

    let transformer = state
        .transformer
        .as_ref()
        .ok_or_else(TransformError::missing_api_key)?;

    let result = transformer.transform(image).await?;
    Ok(Json(result.into()))
}

async fn read_image_field(
    mut multipart: Multipart,
) -> Result<Option<UploadedImage>, TransformError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let mime_type = field.content_type().unwrap_or_default().to_owned();
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(UploadedImage::new(bytes, mime_type, file_name)));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> TransformError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TransformError::TooLarge
    } else {
        TransformError::Unexpected(err.body_text())
    }
}
