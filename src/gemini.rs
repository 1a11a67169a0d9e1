//! Minimal client for the Generative Language REST API.
//!
//! Only the two calls the transform pipeline needs are covered:
//! `generateContent` (text and multimodal models) and the Imagen `predict`
//! endpoint.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpstreamError;

const LOG_PREVIEW_CHARS: usize = 500;
const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, UpstreamError> {
        self.post(self.endpoint(model, "generateContent"), request)
            .await
    }

    pub async fn predict(
        &self,
        model: &str,
        request: &PredictRequest,
    ) -> Result<PredictResponse, UpstreamError> {
        self.post(self.endpoint(model, "predict"), request).await
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post<B, R>(&self, url: String, body: &B) -> Result<R, UpstreamError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(%url, "sending request to Gemini");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        debug!(%status, body = preview(&text, LOG_PREVIEW_CHARS), "Gemini response");

        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_owned(),
        Err(_) => preview(body.trim(), 200).to_owned(),
    }
}

// -- generateContent --------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// A single user turn made of `parts`.
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_owned()),
                parts,
            }],
            generation_config: None,
        }
    }

    /// Ask the model to answer with image parts as well as text.
    pub fn with_image_output(mut self) -> Self {
        self.generation_config = Some(GenerationConfig {
            response_modalities: vec!["TEXT".to_owned(), "IMAGE".to_owned()],
        });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Inline binary payload, base64 encoded for the wire.
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, alias = "mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

impl InlineData {
    pub fn decode(&self) -> Result<Vec<u8>, UpstreamError> {
        Ok(general_purpose::STANDARD.decode(self.data.trim())?)
    }

    pub fn mime_type_or_default(&self) -> &str {
        if self.mime_type.is_empty() {
            DEFAULT_IMAGE_MIME
        } else {
            &self.mime_type
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Result<String, UpstreamError> {
        self.check_blocked()?;

        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(self.empty_answer(UpstreamError::NoText));
        }
        Ok(text)
    }

    /// First inline-data part with a non-empty payload.
    pub fn inline_image(&self) -> Result<&InlineData, UpstreamError> {
        self.check_blocked()?;

        self.first_parts()
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|inline| !inline.data.is_empty())
            .ok_or_else(|| self.empty_answer(UpstreamError::NoImage))
    }

    /// A candidate cut short by anything but a normal stop explains the
    /// missing payload better than `fallback` does.
    fn empty_answer(&self, fallback: UpstreamError) -> UpstreamError {
        match self
            .candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
        {
            Some(reason) if reason != "STOP" => {
                UpstreamError::Blocked(format!("finish reason {reason}"))
            }
            _ => fallback,
        }
    }

    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
    }

    fn check_blocked(&self) -> Result<(), UpstreamError> {
        match self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_ref())
        {
            Some(reason) if self.candidates.is_empty() => {
                Err(UpstreamError::Blocked(reason.clone()))
            }
            _ => Ok(()),
        }
    }
}

// -- Imagen predict ---------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
    pub parameters: PredictParameters,
}

impl PredictRequest {
    /// One image for one prompt.
    pub fn single(prompt: impl Into<String>) -> Self {
        Self {
            instances: vec![PredictInstance {
                prompt: prompt.into(),
            }],
            parameters: PredictParameters { sample_count: 1 },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictInstance {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    pub sample_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub rai_filtered_reason: Option<String>,
}

impl PredictResponse {
    pub fn first_image(&self) -> Result<InlineData, UpstreamError> {
        let prediction = self.predictions.first().ok_or(UpstreamError::NoImage)?;

        match prediction.bytes_base64_encoded.as_deref() {
            Some(data) if !data.is_empty() => Ok(InlineData {
                mime_type: prediction.mime_type.clone().unwrap_or_default(),
                data: data.to_owned(),
            }),
            _ => match &prediction.rai_filtered_reason {
                Some(reason) => Err(UpstreamError::Blocked(reason.clone())),
                None => Err(UpstreamError::NoImage),
            },
        }
    }
}
