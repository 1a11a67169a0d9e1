//! Analyzer and generator doubles with call counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::transform::{ImageAnalyzer, ImageData, ImageGenerator};
use crate::validation::UploadedImage;

/// Always answers with the same description.
#[derive(Debug)]
pub struct StaticAnalyzer {
    description: String,
    calls: AtomicUsize,
}

impl StaticAnalyzer {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageAnalyzer for StaticAnalyzer {
    async fn describe(
        &self,
        _image: &UploadedImage,
        _instruction: &str,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.description.clone())
    }
}

/// Always fails as if the upstream service were unavailable.
#[derive(Debug)]
pub struct FailingAnalyzer {
    message: String,
    calls: AtomicUsize,
}

impl FailingAnalyzer {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageAnalyzer for FailingAnalyzer {
    async fn describe(
        &self,
        _image: &UploadedImage,
        _instruction: &str,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(UpstreamError::Api {
            status: 503,
            message: self.message.clone(),
        })
    }
}

/// Returns fixed image bytes and remembers the last prompt it saw.
#[derive(Debug)]
pub struct StaticGenerator {
    name: String,
    image: ImageData,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl StaticGenerator {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: ImageData {
                bytes,
                mime_type: mime_type.into(),
            },
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .map(|prompt| prompt.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageGenerator for StaticGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        _source: &UploadedImage,
    ) -> Result<ImageData, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_owned());
        }
        Ok(self.image.clone())
    }
}

/// Never produces an image.
#[derive(Debug)]
pub struct FailingGenerator {
    name: String,
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FailingGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        _prompt: &str,
        _source: &UploadedImage,
    ) -> Result<ImageData, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(UpstreamError::NoImage)
    }
}
