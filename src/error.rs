use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

/// Failures talking to the Generative Language API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("prompt was blocked: {0}")]
    Blocked(String),

    #[error("response contained no text")]
    NoText,

    #[error("response contained no image data")]
    NoImage,

    #[error("image data is not valid base64: {0}")]
    InvalidImageData(#[from] base64::DecodeError),
}

/// Everything that can end a transform request early.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("No image file provided")]
    MissingFile,

    #[error("File must be an image")]
    UnsupportedType { mime_type: String },

    #[error("File size must be less than 10MB")]
    TooLarge,

    #[error("Failed to analyze image: {0}")]
    UpstreamAnalysis(#[source] UpstreamError),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Unexpected(String),
}

impl TransformError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::UnsupportedType { .. } | Self::TooLarge => {
                StatusCode::BAD_REQUEST
            }
            Self::UpstreamAnalysis(_) | Self::Configuration(_) | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn missing_api_key() -> Self {
        Self::Configuration("GEMINI_API_KEY environment variable is not set".to_owned())
    }
}

impl IntoResponse for TransformError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_client_error() {
            warn!(%status, error = %message, "rejected transform request");
        } else {
            error!(%status, error = %message, "transform request failed");
        }

        let body = serde_json::json!({ "success": false, "error": message });
        (status, Json(body)).into_response()
    }
}
