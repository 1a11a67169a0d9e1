use std::sync::Arc;

use async_trait::async_trait;

use super::{ImageAnalyzer, ImageData, ImageGenerator};
use crate::error::UpstreamError;
use crate::gemini::{GeminiClient, GenerateContentRequest, InlineData, Part, PredictRequest};
use crate::validation::UploadedImage;

fn decode_image(inline: &InlineData) -> Result<ImageData, UpstreamError> {
    let bytes = inline.decode()?;
    if bytes.is_empty() {
        return Err(UpstreamError::NoImage);
    }
    Ok(ImageData {
        bytes,
        mime_type: inline.mime_type_or_default().to_owned(),
    })
}

/// Describes photos with a multimodal `generateContent` model.
#[derive(Debug)]
pub struct GeminiAnalyzer {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageAnalyzer for GeminiAnalyzer {
    async fn describe(
        &self,
        image: &UploadedImage,
        instruction: &str,
    ) -> Result<String, UpstreamError> {
        let request = GenerateContentRequest::new(vec![
            Part::text(instruction),
            Part::inline(image.mime_type.as_str(), &image.bytes),
        ]);

        self.client
            .generate_content(&self.model, &request)
            .await?
            .text()
    }
}

/// Dedicated text-to-image endpoint (Imagen `predict`).
#[derive(Debug)]
pub struct ImagenGenerator {
    client: Arc<GeminiClient>,
    model: String,
}

impl ImagenGenerator {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for ImagenGenerator {
    fn name(&self) -> &str {
        "imagen"
    }

    async fn generate(
        &self,
        prompt: &str,
        _source: &UploadedImage,
    ) -> Result<ImageData, UpstreamError> {
        let response = self
            .client
            .predict(&self.model, &PredictRequest::single(prompt))
            .await?;

        decode_image(&response.first_image()?)
    }
}

/// Chat-style model that can answer with inline image parts. The source
/// photo is attached next to the prompt as a visual reference.
#[derive(Debug)]
pub struct GeminiImageGenerator {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiImageGenerator {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    fn name(&self) -> &str {
        "gemini-image"
    }

    async fn generate(
        &self,
        prompt: &str,
        source: &UploadedImage,
    ) -> Result<ImageData, UpstreamError> {
        let request = GenerateContentRequest::new(vec![
            Part::text(prompt),
            Part::inline(source.mime_type.as_str(), &source.bytes),
        ])
        .with_image_output();

        let response = self.client.generate_content(&self.model, &request).await?;
        decode_image(response.inline_image()?)
    }
}
