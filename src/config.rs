use std::time::Duration;

use clap::Parser;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Runtime configuration, read from flags or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "photo-stylizer", about = "Turns uploaded photos into stylized artwork")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Generative Language API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the Generative Language REST API.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model used to describe the uploaded photo.
    #[arg(long, env = "GEMINI_ANALYSIS_MODEL", default_value = "gemini-2.5-flash")]
    pub analysis_model: String,

    /// Dedicated image generation model, tried first.
    #[arg(long, env = "IMAGEN_MODEL", default_value = "imagen-4.0-generate-001")]
    pub imagen_model: String,

    /// Multimodal model able to emit inline images, tried second.
    #[arg(
        long,
        env = "GEMINI_IMAGE_MODEL",
        default_value = "gemini-2.5-flash-image-preview"
    )]
    pub image_model: String,

    /// Per-request timeout for upstream calls. Unset means no local timeout.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: Option<u64>,
}

impl Config {
    /// The API key, treating a blank value as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }
}
