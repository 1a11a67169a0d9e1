use axum::body::Bytes;

use crate::error::TransformError;

/// 10 MiB.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const SUPPORTED_FORMATS: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// A file received in the `image` form field. Lives for one request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub mime_type: String,
    pub file_name: String,
}

impl UploadedImage {
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// Checks presence, declared type and size, in that order.
///
/// Only the declared MIME type is inspected; the bytes are never sniffed.
pub fn validate(candidate: Option<UploadedImage>) -> Result<UploadedImage, TransformError> {
    let image = candidate.ok_or(TransformError::MissingFile)?;

    if !image.mime_type.starts_with("image/") {
        return Err(TransformError::UnsupportedType {
            mime_type: image.mime_type,
        });
    }

    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(TransformError::TooLarge);
    }

    Ok(image)
}
