//! Photo-to-stylized-artwork relay service.
//!
//! Uploaded photos are validated, described by a Gemini model and then
//! redrawn by the first image generator that succeeds. Nothing is stored.

pub mod config;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod routes;
pub mod transform;
pub mod validation;

pub use config::Config;
pub use error::{TransformError, UpstreamError};
pub use routes::{router, AppState};
pub use transform::{TransformationOutput, TransformationResult, Transformer};
pub use validation::UploadedImage;
