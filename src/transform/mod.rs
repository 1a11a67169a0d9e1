//! Describe-then-generate pipeline.
//!
//! A photo is first described by an [`ImageAnalyzer`]; the description is
//! then handed to a ranked list of [`ImageGenerator`]s. The first generator
//! that returns image data wins. When none does, the description itself is
//! returned as a fallback.

mod prompts;
mod strategies;

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{TransformError, UpstreamError};
use crate::gemini::GeminiClient;
use crate::validation::UploadedImage;

pub use prompts::{fallback_text, style_prompt, ANALYSIS_INSTRUCTION};
pub use strategies::{GeminiAnalyzer, GeminiImageGenerator, ImagenGenerator};

/// Produces a free-form description of a photo.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync + std::fmt::Debug {
    async fn describe(
        &self,
        image: &UploadedImage,
        instruction: &str,
    ) -> Result<String, UpstreamError>;
}

/// One way of turning a synthesis prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync + std::fmt::Debug {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        source: &UploadedImage,
    ) -> Result<ImageData, UpstreamError>;
}

/// Decoded image returned by a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Payload of a successful transform. Exactly one kind is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TransformationOutput {
    GeneratedImage {
        #[serde(rename = "imageBase64", serialize_with = "as_base64")]
        bytes: Vec<u8>,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    FallbackDescription {
        #[serde(rename = "description")]
        text: String,
    },
}

impl From<ImageData> for TransformationOutput {
    fn from(image: ImageData) -> Self {
        Self::GeneratedImage {
            bytes: image.bytes,
            mime_type: image.mime_type,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    #[serde(flatten)]
    pub output: TransformationOutput,
    pub original_file_name: String,
    #[serde(serialize_with = "iso_millis")]
    pub processed_at: DateTime<Utc>,
}

fn as_base64<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
}

fn iso_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug)]
pub struct Transformer {
    analyzer: Arc<dyn ImageAnalyzer>,
    generators: Vec<Arc<dyn ImageGenerator>>,
}

impl Transformer {
    /// `generators` are tried in the given order.
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, generators: Vec<Arc<dyn ImageGenerator>>) -> Self {
        Self {
            analyzer,
            generators,
        }
    }

    /// Gemini analysis, then Imagen, then the multimodal image model.
    pub fn with_gemini(client: Arc<GeminiClient>, config: &Config) -> Self {
        Self::new(
            Arc::new(GeminiAnalyzer::new(
                Arc::clone(&client),
                &config.analysis_model,
            )),
            vec![
                Arc::new(ImagenGenerator::new(
                    Arc::clone(&client),
                    &config.imagen_model,
                )),
                Arc::new(GeminiImageGenerator::new(client, &config.image_model)),
            ],
        )
    }

    pub async fn transform(
        &self,
        image: UploadedImage,
    ) -> Result<TransformationResult, TransformError> {
        let description = self.describe(&image).await?;
        let output = self.stylize(&description, &image).await;

        Ok(TransformationResult {
            output,
            original_file_name: image.file_name,
            processed_at: Utc::now(),
        })
    }

    /// Stage one. Any failure here aborts the pipeline.
    pub async fn describe(&self, image: &UploadedImage) -> Result<String, TransformError> {
        info!(
            file = %image.file_name,
            mime_type = %image.mime_type,
            bytes = image.bytes.len(),
            "analyzing uploaded image"
        );

        let description = self
            .analyzer
            .describe(image, ANALYSIS_INSTRUCTION)
            .await
            .map_err(TransformError::UpstreamAnalysis)?;

        if description.trim().is_empty() {
            return Err(TransformError::UpstreamAnalysis(UpstreamError::NoText));
        }

        debug!(chars = description.len(), "image analysis complete");
        Ok(description)
    }

    /// Stage two. Never fails; degrades to the description.
    pub async fn stylize(&self, description: &str, source: &UploadedImage) -> TransformationOutput {
        let prompt = style_prompt(description);

        for generator in &self.generators {
            match generator.generate(&prompt, source).await {
                Ok(image) if !image.bytes.is_empty() => {
                    info!(
                        generator = generator.name(),
                        bytes = image.bytes.len(),
                        mime_type = %image.mime_type,
                        "stylized image generated"
                    );
                    return image.into();
                }
                Ok(_) => warn!(generator = generator.name(), "generator returned an empty image"),
                Err(err) => warn!(
                    generator = generator.name(),
                    error = %err,
                    "image generation attempt failed"
                ),
            }
        }

        info!("no generator produced an image, returning analysis");
        TransformationOutput::FallbackDescription {
            text: fallback_text(description),
        }
    }
}
